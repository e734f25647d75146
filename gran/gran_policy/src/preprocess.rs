//! Policy preprocessor.
//!
//! Produces a single text buffer ready for lexing. The passes run in a
//! fixed order over the concatenated text: include resolution, comment
//! purge, `replace` substitution, `define` substitution, brace purge,
//! reserved-word disambiguation, and `role_allow_ip` purge.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use gran_core::{ParseError, Result};

/// Preprocess the policy rooted at `root` (a file or a directory).
pub fn preprocess(root: &Path) -> Result<String> {
    let base = if root.is_dir() {
        root.to_path_buf()
    } else {
        root.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    };

    let mut stack = Vec::new();
    let text = expand_includes(root, &base, &mut stack)?;
    let text = strip_comments(&text);
    let (text, replaces) = collect_replaces(&text);
    let text = apply_replaces(text, &replaces);
    let (text, defines) = collect_defines(&text)?;
    let text = apply_defines(text, &defines);
    let text = purge_braces(&text);
    let text = rewrite_reserved(&text);
    let text = drop_role_allow_ip(&text);
    debug!(bytes = text.len(), "policy preprocessed");
    Ok(text)
}

/// Read `path`, splicing in every `include` target recursively.
///
/// Directories expand to the concatenation of their immediate entries,
/// sorted by file name; hidden files are included.
fn expand_includes(path: &Path, base: &Path, stack: &mut Vec<PathBuf>) -> Result<String> {
    if stack.iter().any(|p| p == path) {
        return Err(ParseError::IncludeCycle(path.to_path_buf()).into());
    }
    stack.push(path.to_path_buf());
    let result = expand_includes_inner(path, base, stack);
    stack.pop();
    result
}

fn expand_includes_inner(path: &Path, base: &Path, stack: &mut Vec<PathBuf>) -> Result<String> {
    if path.is_dir() {
        let mut entries: Vec<PathBuf> = fs::read_dir(path)
            .map_err(|source| ParseError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();
        let mut out = String::new();
        for entry in entries {
            out.push_str(&expand_includes(&entry, base, stack)?);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        return Ok(out);
    }

    let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim_start();
        if let Some(target) = include_target(trimmed) {
            let resolved = resolve_include(target, base);
            debug!(include = target, resolved = %resolved.display(), "resolving include");
            out.push_str(&expand_includes(&resolved, base, stack)?);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    Ok(out)
}

fn include_target(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("include")?;
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    let target = rest.trim();
    (!target.is_empty()).then_some(target)
}

/// Resolve an include target against the policy directory.
///
/// The `/etc/grsec` prefix of an absolute target is stripped first, so
/// policies written for a live system work from any checkout.
fn resolve_include(target: &str, base: &Path) -> PathBuf {
    let target = Path::new(target);
    if let Ok(rest) = target.strip_prefix("/etc/grsec") {
        base.join(rest)
    } else if target.is_absolute() {
        target.to_path_buf()
    } else {
        base.join(target)
    }
}

/// Remove `#` through end-of-line.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        out.push_str(line.split('#').next().unwrap_or(""));
        out.push('\n');
    }
    out
}

/// Gather `replace NAME VALUE` declarations and remove them.
fn collect_replaces(text: &str) -> (String, Vec<(String, String)>) {
    let mut replaces = Vec::new();
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() == Some("replace") {
            if let Some(name) = tokens.next() {
                let value = tokens.collect::<Vec<_>>().join(" ");
                replaces.push((name.to_string(), value));
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    (out, replaces)
}

/// Substitute every `$(NAME)` in declaration order.
fn apply_replaces(mut text: String, replaces: &[(String, String)]) -> String {
    for (name, value) in replaces {
        text = text.replace(&format!("$({})", name), value);
    }
    text
}

/// Gather `define NAME { BODY }` blocks and remove them.
///
/// `BODY` may span lines; nested braces are balanced.
fn collect_defines(text: &str) -> Result<(String, Vec<(String, String)>)> {
    let mut defines = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while pos < text.len() {
        let line_end = text[pos..]
            .find('\n')
            .map(|o| pos + o + 1)
            .unwrap_or(text.len());
        let line = &text[pos..line_end];
        let trimmed = line.trim_start();
        let is_define = trimmed
            .strip_prefix("define")
            .is_some_and(|rest| rest.starts_with([' ', '\t']));
        if !is_define {
            out.push_str(line);
            pos = line_end;
            continue;
        }

        let after = trimmed["define".len()..].trim_start();
        let name: String = after
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if name.is_empty() {
            return Err(ParseError::Syntax("define without a name".into()).into());
        }
        // The opening brace sits on the declaration line.
        let open = line
            .find('{')
            .map(|o| pos + o)
            .ok_or_else(|| ParseError::Syntax(format!("define {} without a body", name)))?;
        let mut depth = 0usize;
        let mut close = None;
        for (off, ch) in text[open..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + off);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close =
            close.ok_or_else(|| ParseError::Syntax(format!("unclosed define {}", name)))?;
        let body = text[open + 1..close].trim_matches('\n').to_string();
        defines.push((name, body));
        pos = text[close..]
            .find('\n')
            .map(|o| close + o + 1)
            .unwrap_or(text.len());
    }
    Ok((out, defines))
}

/// Substitute every `$NAME`, longest names first so that one name
/// being a prefix of another cannot corrupt the expansion.
fn apply_defines(mut text: String, defines: &[(String, String)]) -> String {
    let mut ordered: Vec<&(String, String)> = defines.iter().collect();
    ordered.sort_by_key(|(name, _)| std::cmp::Reverse(name.len()));
    for (name, body) in ordered {
        text = text.replace(&format!("${}", name), body);
    }
    text
}

/// Delete all `{` and `}` characters.
fn purge_braces(text: &str) -> String {
    text.chars().filter(|c| *c != '{' && *c != '}').collect()
}

/// Rewrite lines beginning with `connect` or `bind` so the parser can
/// tell these ip-ACL rules from homonymous identifiers.
fn rewrite_reserved(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim_start();
        let indent = &line[..line.len() - trimmed.len()];
        let word = trimmed.split_whitespace().next().unwrap_or("");
        if word == "connect" || word == "bind" {
            out.push_str(indent);
            out.push_str(word);
            out.push_str("_reserved");
            out.push_str(&trimmed[word.len()..]);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Drop `role_allow_ip` lines entirely.
fn drop_role_allow_ip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if line.split_whitespace().next() != Some("role_allow_ip") {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_comments_and_braces_removed() {
        let dir = TempDir::new().unwrap();
        let root = write_file(&dir, "policy", "role admin sA # the admin\nsubject / {\n\t/ h\n}\n");
        let text = preprocess(&root).unwrap();
        assert!(!text.contains('#'));
        assert!(!text.contains('{'));
        assert!(!text.contains('}'));
        assert!(text.contains("role admin sA"));
    }

    #[test]
    fn test_include_resolution() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "objs", "/etc r\n");
        let root = write_file(&dir, "policy", "role default\nsubject /\ninclude /etc/grsec/objs\n");
        let text = preprocess(&root).unwrap();
        assert!(text.contains("/etc r"));
        assert!(!text.contains("include"));
    }

    #[test]
    fn test_include_directory_sorted() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "policy.d/b", "role beta u\nsubject /\n/ h\n");
        write_file(&dir, "policy.d/a", "role alpha u\nsubject /\n/ h\n");
        let root = write_file(&dir, "policy", "include policy.d\n");
        let text = preprocess(&root).unwrap();
        let alpha = text.find("role alpha").unwrap();
        let beta = text.find("role beta").unwrap();
        assert!(alpha < beta);
    }

    #[test]
    fn test_missing_include_is_fatal() {
        let dir = TempDir::new().unwrap();
        let root = write_file(&dir, "policy", "include nowhere\n");
        assert!(preprocess(&root).is_err());
    }

    #[test]
    fn test_include_cycle_detected() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a", "include b\n");
        write_file(&dir, "b", "include a\n");
        let root = write_file(&dir, "policy", "include a\n");
        assert!(preprocess(&root).is_err());
    }

    #[test]
    fn test_replace_substitution() {
        let dir = TempDir::new().unwrap();
        let root = write_file(
            &dir,
            "policy",
            "replace HOMEDIR /home/admin\nrole default\nsubject /\n$(HOMEDIR) r\n",
        );
        let text = preprocess(&root).unwrap();
        assert!(text.contains("/home/admin r"));
        assert!(!text.contains("replace"));
        assert!(!text.contains("$(HOMEDIR)"));
    }

    #[test]
    fn test_define_substitution_multiline() {
        let dir = TempDir::new().unwrap();
        let root = write_file(
            &dir,
            "policy",
            "define denied {\n\t/boot h\n\t/proc/kcore h\n}\nrole default\nsubject /\n$denied\n",
        );
        let text = preprocess(&root).unwrap();
        assert!(text.contains("/boot h"));
        assert!(text.contains("/proc/kcore h"));
        assert!(!text.contains("define"));
        assert!(!text.contains("$denied"));
    }

    #[test]
    fn test_reserved_words_rewritten() {
        let dir = TempDir::new().unwrap();
        let root = write_file(
            &dir,
            "policy",
            "role default\nsubject /\nconnect 10.0.0.1/32:22 stream tcp\nbind disabled\n",
        );
        let text = preprocess(&root).unwrap();
        assert!(text.contains("connect_reserved 10.0.0.1/32:22 stream tcp"));
        assert!(text.contains("bind_reserved disabled"));
    }

    #[test]
    fn test_role_allow_ip_dropped() {
        let dir = TempDir::new().unwrap();
        let root = write_file(&dir, "policy", "role default\nrole_allow_ip 10.0.0.1\nsubject /\n");
        let text = preprocess(&root).unwrap();
        assert!(!text.contains("role_allow_ip"));
    }
}
