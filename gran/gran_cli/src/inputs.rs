//! Entry-point, target, and learn-config file parsing.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use gran_core::{State, DONTCARE};

/// Parsed entry-points file: single states drive the direct and
/// write-execute analyses, `(source, reader, target)` triples drive
/// the indirect analysis.
#[derive(Debug, Default)]
pub struct EntryPoints {
    pub states: Vec<State>,
    pub triples: Vec<(State, State, String)>,
}

/// Parse a state written as `role:TYPE:subject`, with `TYPE` one of
/// `S`, `U`, `G`, `D` placing the role in the special, user, or group
/// slot; `D` leaves every slot unset.
pub fn parse_state_spec(spec: &str) -> Result<State> {
    let mut parts = spec.splitn(3, ':');
    let (Some(role), Some(kind), Some(subject)) = (parts.next(), parts.next(), parts.next())
    else {
        bail!("malformed state {spec:?}, expected role:TYPE:subject");
    };
    if !subject.starts_with('/') {
        bail!("state {spec:?} has a non-absolute subject path");
    }
    let state = match kind {
        "S" => State::new(role, DONTCARE, DONTCARE, subject),
        "U" => State::new(DONTCARE, role, DONTCARE, subject),
        "G" => State::new(DONTCARE, DONTCARE, role, subject),
        "D" => State::new(DONTCARE, DONTCARE, DONTCARE, subject),
        other => bail!("state {spec:?} has unknown type {other:?}, expected S, U, G, or D"),
    };
    Ok(state)
}

/// Read an entry-points file: one record per line, either a single
/// state or `<source> <reader> <target>` for the indirect analysis.
pub fn read_entry_points(path: &Path) -> Result<EntryPoints> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read entry points from {}", path.display()))?;
    let mut entries = EntryPoints::default();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [state] => entries.states.push(parse_state_spec(state)?),
            [source, reader, target] => {
                if !target.starts_with('/') {
                    bail!(
                        "{}:{}: indirect target {target:?} is not an absolute path",
                        path.display(),
                        number + 1
                    );
                }
                entries.triples.push((
                    parse_state_spec(source)?,
                    parse_state_spec(reader)?,
                    target.to_string(),
                ));
            }
            _ => bail!(
                "{}:{}: expected one state or `source reader target`",
                path.display(),
                number + 1
            ),
        }
    }
    Ok(entries)
}

/// Read a targets file: one path per line, blank and comment lines
/// ignored.
pub fn read_targets(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read targets from {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Extract targets from a learn-config file: every path following a
/// `read-protected-path` or `high-protected-path` keyword.
pub fn read_learn_config(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read learn config from {}", path.display()))?;
    let mut targets = Vec::new();
    for line in text.lines() {
        let mut tokens = line.split_whitespace().peekable();
        while let Some(token) = tokens.next() {
            if token == "read-protected-path" || token == "high-protected-path" {
                if let Some(target) = tokens.peek() {
                    targets.push(target.to_string());
                }
            }
        }
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_state_spec_slots() {
        assert_eq!(
            parse_state_spec("admin:S:/bin/sh").unwrap(),
            State::new("admin", "_", "_", "/bin/sh")
        );
        assert_eq!(
            parse_state_spec("alice:U:/").unwrap(),
            State::new("_", "alice", "_", "/")
        );
        assert_eq!(
            parse_state_spec("wheel:G:/usr").unwrap(),
            State::new("_", "_", "wheel", "/usr")
        );
        assert_eq!(
            parse_state_spec("default:D:/").unwrap(),
            State::new("_", "_", "_", "/")
        );
    }

    #[test]
    fn test_state_spec_rejects_garbage() {
        assert!(parse_state_spec("admin:/bin/sh").is_err());
        assert!(parse_state_spec("admin:X:/bin/sh").is_err());
        assert!(parse_state_spec("admin:S:relative").is_err());
    }

    #[test]
    fn test_entry_points_states_and_triples() {
        let f = file_with(
            "# entry points\n\nalice:U:/bin/sh\nalice:U:/ bob:U:/ /etc/secret\n",
        );
        let entries = read_entry_points(f.path()).unwrap();
        assert_eq!(entries.states.len(), 1);
        assert_eq!(entries.triples.len(), 1);
        assert_eq!(entries.triples[0].2, "/etc/secret");
    }

    #[test]
    fn test_entry_points_rejects_two_fields() {
        let f = file_with("alice:U:/ bob:U:/\n");
        assert!(read_entry_points(f.path()).is_err());
    }

    #[test]
    fn test_targets_skip_comments() {
        let f = file_with("/etc/shadow\n\n# secrets\n/etc/ssh/ssh_host_rsa_key\n");
        let targets = read_targets(f.path()).unwrap();
        assert_eq!(targets, vec!["/etc/shadow", "/etc/ssh/ssh_host_rsa_key"]);
    }

    #[test]
    fn test_learn_config_keywords() {
        let f = file_with(
            "inherit-learn /usr\nread-protected-path /etc/shadow\n\
             high-protected-path /etc/ssh\nhigh-reduce-path /var\n",
        );
        let targets = read_learn_config(f.path()).unwrap();
        assert_eq!(targets, vec!["/etc/shadow", "/etc/ssh"]);
    }
}
