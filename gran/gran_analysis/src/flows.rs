//! Flow analysers.
//!
//! Three searches built on the reachability engine: direct flows (a
//! target readable or writable along some walk from an entry point),
//! indirect flows (one actor writes an intermediate object after
//! reading the target, another actor reads the intermediate), and
//! write–execute flows (one object both writable and executable from
//! the same entry point).

use serde::Serialize;
use tracing::debug;

use gran_core::{AccessMode, Label, State};

use crate::reach::Trace;
use crate::Analysis;

/// One edge of a rendered path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStep {
    pub from: State,
    pub label: Label,
}

/// A reachable state satisfying a predicate, with one path to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowHit {
    pub state: State,
    pub trace: Vec<TraceStep>,
}

/// A direct read or write flow from an entry point to a target.
#[derive(Debug, Serialize)]
pub struct DirectFinding {
    pub entry: State,
    pub target: String,
    pub mode: AccessMode,
    pub hits: Vec<FlowHit>,
}

/// An indirect flow: `source` reads the target and writes the
/// intermediate object; `reader` reads the intermediate.
#[derive(Debug, Serialize)]
pub struct IndirectFinding {
    pub source: State,
    pub reader: State,
    pub target: String,
    pub intermediate: String,
    pub write_traces: Vec<Trace>,
    pub read_hits: Vec<FlowHit>,
}

/// An object both writable and executable from one entry point.
#[derive(Debug, Serialize)]
pub struct WriteExecFinding {
    pub entry: State,
    pub object: String,
    pub write_traces: Vec<Trace>,
    pub exec_traces: Vec<Trace>,
}

impl Analysis {
    /// Direct flows: for every `(entry, target)` pair, the entry point
    /// itself if it satisfies the predicate, otherwise every reachable
    /// state that does.
    pub fn direct_flows(
        &self,
        entries: &[State],
        targets: &[String],
        mode: AccessMode,
    ) -> Vec<DirectFinding> {
        let mut findings = Vec::new();
        for entry in entries {
            let reached = self.reachable_states_edges(entry);
            for target in targets {
                let mut hits = Vec::new();
                if self.allowed(entry, target, mode) {
                    hits.push(FlowHit {
                        state: entry.clone(),
                        trace: Vec::new(),
                    });
                } else {
                    for (state, trace) in &reached {
                        if self.allowed(state, target, mode) {
                            hits.push(FlowHit {
                                state: state.clone(),
                                trace: steps(trace),
                            });
                        }
                    }
                    hits.sort_by(|a, b| a.state.cmp(&b.state));
                }
                if !hits.is_empty() {
                    debug!(path = %target, hits = hits.len(), "direct flow");
                    findings.push(DirectFinding {
                        entry: entry.clone(),
                        target: target.clone(),
                        mode,
                        hits,
                    });
                }
            }
        }
        findings
    }

    /// Indirect flows over configured `(source, reader, target)`
    /// triples.
    pub fn indirect_flows(&self, triples: &[(State, State, String)]) -> Vec<IndirectFinding> {
        let mut findings = Vec::new();
        for (source, reader, target) in triples {
            let intermediates = self.reachable_write_objects(source, target);
            if intermediates.is_empty() {
                continue;
            }
            let reader_states = self.reachable_states_edges(reader);
            for (object, write_traces) in intermediates {
                let mut read_hits: Vec<FlowHit> = reader_states
                    .iter()
                    .filter(|(state, _)| self.read_allowed(state, &object))
                    .map(|(state, trace)| FlowHit {
                        state: state.clone(),
                        trace: steps(trace),
                    })
                    .collect();
                if read_hits.is_empty() {
                    continue;
                }
                read_hits.sort_by(|a, b| a.state.cmp(&b.state));
                debug!(path = %target, intermediate = %object, "indirect flow");
                findings.push(IndirectFinding {
                    source: source.clone(),
                    reader: reader.clone(),
                    target: target.clone(),
                    intermediate: object,
                    write_traces,
                    read_hits,
                });
            }
        }
        findings
    }

    /// Write–execute flows: objects writable and executable along
    /// walks from the same entry point.
    pub fn write_exec_flows(&self, entries: &[State]) -> Vec<WriteExecFinding> {
        let mut findings = Vec::new();
        for entry in entries {
            let writes = self.trace_to_perm(entry, AccessMode::Write);
            let execs = self.trace_to_perm(entry, AccessMode::Exec);
            for (object, write_traces) in writes {
                let Some(exec_traces) = execs.get(&object) else {
                    continue;
                };
                debug!(object = %object, "write-exec flow");
                findings.push(WriteExecFinding {
                    entry: entry.clone(),
                    object,
                    write_traces,
                    exec_traces: exec_traces.clone(),
                });
            }
        }
        findings
    }
}

fn steps(trace: &[(State, Label)]) -> Vec<TraceStep> {
    trace
        .iter()
        .map(|(from, label)| TraceStep {
            from: from.clone(),
            label: label.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AnalysisOptions;
    use gran_policy::compile_text;

    fn analysis(text: &str, options: AnalysisOptions) -> Analysis {
        Analysis::build(compile_text(text).unwrap(), options, &[]).unwrap()
    }

    #[test]
    fn test_empty_policy_has_no_flows() {
        let a = analysis("", AnalysisOptions::default());
        let entry = State::new("_", "_", "_", "/");
        let findings = a.direct_flows(
            &[entry.clone()],
            &["/etc/shadow".to_string()],
            AccessMode::Read,
        );
        assert!(findings.is_empty());
        assert!(a.write_exec_flows(&[entry]).is_empty());
    }

    #[test]
    fn test_hidden_target_yields_no_direct_flow() {
        let text = "role r u\nsubject /\n\t/etc/shadow rh\n\t/ h\n-CAP_ALL\n";
        let a = analysis(text, AnalysisOptions::default());
        let entry = State::new("_", "r", "_", "/");
        let findings =
            a.direct_flows(&[entry], &["/etc/shadow".to_string()], AccessMode::Read);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_direct_flow_at_entry_point() {
        let text = "role r u\nsubject /\n\t/etc/shadow r\n\t/ h\n-CAP_ALL\n";
        let a = analysis(text, AnalysisOptions::default());
        let entry = State::new("_", "r", "_", "/");
        let findings =
            a.direct_flows(&[entry.clone()], &["/etc/shadow".to_string()], AccessMode::Read);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].hits.len(), 1);
        assert_eq!(findings[0].hits[0].state, entry);
        assert!(findings[0].hits[0].trace.is_empty());
    }

    #[test]
    fn test_direct_flow_through_inherited_permission() {
        let text = "role r u\nsubject /usr\n\t/etc/passwd r\n\t/ h\nsubject /usr/bin\n\t/ h\n\
                    -CAP_ALL\n";
        let a = analysis(text, AnalysisOptions::default());
        // The state's subject resolves to /usr/bin, which inherited
        // the /etc/passwd grant from /usr.
        let entry = State::new("_", "r", "_", "/usr/bin/sh");
        assert!(a.read_allowed(&entry, "/etc/passwd"));
    }

    #[test]
    fn test_direct_flow_after_transition() {
        let text = "role default\nrole_transitions admin\nsubject /\n\t/ h\n-CAP_ALL\n\
                    role admin s\nsubject /\n\t/etc/shadow w\n\t/ h\n-CAP_ALL\n";
        let a = analysis(text, AnalysisOptions::default());
        let entry = State::new("_", "_", "_", "/");
        let findings =
            a.direct_flows(&[entry], &["/etc/shadow".to_string()], AccessMode::Write);
        assert_eq!(findings.len(), 1);
        let hit = &findings[0].hits[0];
        assert_eq!(hit.state, State::new("admin", "_", "_", "/"));
        assert_eq!(hit.trace.len(), 1);
        assert_eq!(hit.trace[0].label, Label::SetRole("admin".to_string()));
    }

    #[test]
    fn test_indirect_flow_fixture() {
        // s1 reads the target and writes /tmp/x; s2 reads /tmp/x.
        let text = "role s1 u\nsubject /\n\t/ h\n\t/etc/secret r\n\t/tmp/x w\n-CAP_ALL\n\
                    role s2 u\nsubject /\n\t/ h\n\t/tmp/x r\n-CAP_ALL\n";
        let a = analysis(text, AnalysisOptions::default());
        let s1 = State::new("_", "s1", "_", "/");
        let s2 = State::new("_", "s2", "_", "/");
        let findings =
            a.indirect_flows(&[(s1.clone(), s2.clone(), "/etc/secret".to_string())]);
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.intermediate, "/tmp/x");
        assert!(!finding.write_traces.is_empty());
        assert_eq!(finding.read_hits.len(), 1);
        assert_eq!(finding.read_hits[0].state, s2);
    }

    #[test]
    fn test_indirect_flow_needs_reader() {
        let text = "role s1 u\nsubject /\n\t/ h\n\t/etc/secret r\n\t/tmp/x w\n-CAP_ALL\n\
                    role s2 u\nsubject /\n\t/ h\n-CAP_ALL\n";
        let a = analysis(text, AnalysisOptions::default());
        let s1 = State::new("_", "s1", "_", "/");
        let s2 = State::new("_", "s2", "_", "/");
        assert!(a
            .indirect_flows(&[(s1, s2, "/etc/secret".to_string())])
            .is_empty());
    }

    #[test]
    fn test_write_exec_flow() {
        let text = "role r u\nsubject /\n\t/ h\n\t/usr/local/bin wx\n-CAP_ALL\n";
        let a = analysis(text, AnalysisOptions::default());
        let entry = State::new("_", "r", "_", "/");
        let findings = a.write_exec_flows(&[entry]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].object, "/usr/local/bin");
        assert!(!findings[0].write_traces.is_empty());
        assert!(!findings[0].exec_traces.is_empty());
    }

    #[test]
    fn test_write_exec_requires_both_modes() {
        let text = "role r u\nsubject /\n\t/ h\n\t/tmp w\n\t/bin x\n-CAP_ALL\n";
        let a = analysis(text, AnalysisOptions::default());
        let entry = State::new("_", "r", "_", "/");
        assert!(a.write_exec_flows(&[entry]).is_empty());
    }
}
