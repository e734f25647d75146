mod cli;
mod formatter;
mod inputs;
mod logging;

use std::fs;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use gran_analysis::{Analysis, AnalysisOptions, DirectFinding, IndirectFinding, WriteExecFinding};
use gran_core::{AccessMode, State, DONTCARE};

use crate::cli::Cli;
use crate::inputs::EntryPoints;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.debug);
    if let Err(err) = run(&cli) {
        eprintln!("{} {:#}", "[ERROR]".red().bold(), err);
        process::exit(1);
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    direct_read: &'a [DirectFinding],
    direct_write: &'a [DirectFinding],
    indirect: &'a [IndirectFinding],
    write_exec: &'a [WriteExecFinding],
}

fn run(cli: &Cli) -> Result<()> {
    let text = gran_policy::preprocess(&cli.policy)?;
    if let Some(path) = &cli.processedpolicy {
        fs::write(path, &text)
            .with_context(|| format!("cannot write processed policy to {}", path.display()))?;
        info!(path = %path.display(), "processed policy written");
    }
    let tables = gran_policy::compile_text(&text)?;

    let mut targets = Vec::new();
    if let Some(path) = &cli.targets {
        targets.extend(inputs::read_targets(path)?);
    }
    if let Some(path) = &cli.learnconfig {
        targets.extend(inputs::read_learn_config(path)?);
    }
    targets.sort();
    targets.dedup();

    let entries = match &cli.entrypoints {
        Some(path) => inputs::read_entry_points(path)?,
        None => EntryPoints::default(),
    };
    if entries.states.is_empty() && entries.triples.is_empty() {
        info!("no entry points configured; nothing to analyse");
        return Ok(());
    }
    check_entry_roles(&tables, &entries);

    let mut seeds: Vec<State> = entries.states.clone();
    for (source, reader, _) in &entries.triples {
        seeds.push(source.clone());
        seeds.push(reader.clone());
    }
    let analysis = Analysis::build(
        tables,
        AnalysisOptions {
            admin: cli.admin,
            best_case: cli.bestcase,
        },
        &seeds,
    )?;

    let direct_read = analysis.direct_flows(&entries.states, &targets, AccessMode::Read);
    let direct_write = analysis.direct_flows(&entries.states, &targets, AccessMode::Write);
    let indirect = analysis.indirect_flows(&entries.triples);
    let write_exec = analysis.write_exec_flows(&entries.states);

    formatter::print_report(&analysis, &direct_read, &direct_write, &indirect, &write_exec);

    if let Some(path) = &cli.json {
        let report = JsonReport {
            direct_read: &direct_read,
            direct_write: &direct_write,
            indirect: &indirect,
            write_exec: &write_exec,
        };
        fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("cannot write findings to {}", path.display()))?;
        info!(path = %path.display(), "findings written");
    }
    Ok(())
}

/// Warn about entry-point roles the policy never declares; the walk
/// would silently run under the default role otherwise.
fn check_entry_roles(tables: &gran_policy::PolicyTables, entries: &EntryPoints) {
    let states = entries.states.iter().chain(
        entries
            .triples
            .iter()
            .flat_map(|(source, reader, _)| [source, reader]),
    );
    for state in states {
        for slot in [&state.special, &state.user, &state.group] {
            if slot.as_str() != DONTCARE && !tables.roles.contains_key(slot) {
                warn!(role = %slot, "entry point names an undeclared role");
            }
        }
    }
}
