//! Report rendering.
//!
//! States render as `role:KIND:subject` and traces as alternating
//! `-label->` arrows, so a finding reads as the path an attacker
//! would walk.

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use gran_analysis::{
    render_state, Analysis, DirectFinding, FlowHit, IndirectFinding, WriteExecFinding,
};
use gran_core::{AccessMode, Label};

/// Render one path as `state -label-> state -label-> state`.
pub fn render_hit(analysis: &Analysis, hit: &FlowHit) -> String {
    let mut out = String::new();
    for step in &hit.trace {
        out.push_str(&render_state(&analysis.tables, &step.from));
        out.push_str(&format!(" -{}-> ", step.label));
    }
    out.push_str(&render_state(&analysis.tables, &hit.state));
    out
}

/// Render a label-only trace as `-label-> -label->`; the empty trace
/// is the entry point itself.
pub fn render_label_trace(trace: &[Label]) -> String {
    if trace.is_empty() {
        return "(at entry point)".to_string();
    }
    trace
        .iter()
        .map(|label| format!("-{}->", label))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print the complete human-readable report to stdout.
pub fn print_report(
    analysis: &Analysis,
    direct_read: &[DirectFinding],
    direct_write: &[DirectFinding],
    indirect: &[IndirectFinding],
    write_exec: &[WriteExecFinding],
) {
    let mut summary = Table::new();
    summary
        .set_header(vec!["Analysis", "Findings"])
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    summary.add_row(vec!["direct read flows".to_string(), direct_read.len().to_string()]);
    summary.add_row(vec!["direct write flows".to_string(), direct_write.len().to_string()]);
    summary.add_row(vec!["indirect flows".to_string(), indirect.len().to_string()]);
    summary.add_row(vec!["write-exec flows".to_string(), write_exec.len().to_string()]);
    println!("{summary}");

    print_direct(analysis, direct_read, AccessMode::Read);
    print_direct(analysis, direct_write, AccessMode::Write);
    print_indirect(analysis, indirect);
    print_write_exec(analysis, write_exec);

    let total = direct_read.len() + direct_write.len() + indirect.len() + write_exec.len();
    if total == 0 {
        println!("{}", "No information flows found.".green());
    }
}

fn print_direct(analysis: &Analysis, findings: &[DirectFinding], mode: AccessMode) {
    if findings.is_empty() {
        return;
    }
    let heading = match mode {
        AccessMode::Read => "Direct read flows",
        AccessMode::Write => "Direct write flows",
        AccessMode::Exec => "Direct exec flows",
    };
    println!("\n{}", heading.red().bold());
    for finding in findings {
        let verb = match finding.mode {
            AccessMode::Read => "readable",
            AccessMode::Write => "writable",
            AccessMode::Exec => "executable",
        };
        println!(
            "  {} {} from {}:",
            finding.target.yellow(),
            verb,
            render_state(&analysis.tables, &finding.entry)
        );
        for hit in &finding.hits {
            println!("    {}", render_hit(analysis, hit));
        }
    }
}

fn print_indirect(analysis: &Analysis, findings: &[IndirectFinding]) {
    if findings.is_empty() {
        return;
    }
    println!("\n{}", "Indirect flows".red().bold());
    for finding in findings {
        println!(
            "  {} leaks via {} (written by {}, read by {}):",
            finding.target.yellow(),
            finding.intermediate.yellow(),
            render_state(&analysis.tables, &finding.source),
            render_state(&analysis.tables, &finding.reader)
        );
        for trace in &finding.write_traces {
            println!("    write: {}", render_label_trace(trace));
        }
        for hit in &finding.read_hits {
            println!("    read:  {}", render_hit(analysis, hit));
        }
    }
}

fn print_write_exec(analysis: &Analysis, findings: &[WriteExecFinding]) {
    if findings.is_empty() {
        return;
    }
    println!("\n{}", "Write-exec flows".red().bold());
    for finding in findings {
        println!(
            "  {} is writable and executable from {}:",
            finding.object.yellow(),
            render_state(&analysis.tables, &finding.entry)
        );
        for trace in &finding.write_traces {
            println!("    write: {}", render_label_trace(trace));
        }
        for trace in &finding.exec_traces {
            println!("    exec:  {}", render_label_trace(trace));
        }
    }
}
