//! Inheritance closure.
//!
//! Inside a role, a subject without the `o` flag inherits permissions
//! and capability deltas from its parent: the longest proper-prefix
//! subject path that matches it. Children are processed shortest path
//! first, so a parent's entries are final before any child copies
//! them, and chains deeper than one level close transitively.

use tracing::debug;

use gran_core::cap_compute;

use crate::build::PolicyTables;

/// Close permissions and capabilities over subject parents, per role.
pub fn apply_inheritance(tables: &mut PolicyTables) {
    let roles: Vec<String> = tables.roles.keys().cloned().collect();
    for role in roles {
        let Some(subjects) = tables.role_subjects.get(&role) else {
            continue;
        };
        let mut inherit: Vec<String> = subjects
            .iter()
            .filter(|(_, mode)| !mode.contains('o'))
            .map(|(path, _)| path.clone())
            .collect();
        inherit.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        for child in inherit {
            let Some(parent) = tables
                .subject_paths
                .get(&role)
                .and_then(|set| set.gmp_excluding(&child, &child))
                .map(str::to_string)
            else {
                continue;
            };
            debug!(role = %role, child = %child, from = %parent, "inheriting");

            let parent_key = (role.clone(), parent.clone());
            let child_key = (role.clone(), child.clone());

            // Parent deltas come first; the child's own deltas rule.
            let mut deltas = tables.caps.get(&parent_key).cloned().unwrap_or_default();
            deltas.extend(
                tables
                    .caps
                    .get(&child_key)
                    .map(|d| d.iter().copied())
                    .into_iter()
                    .flatten(),
            );
            tables.eff_caps.insert(child_key.clone(), cap_compute(&deltas));
            tables.caps.insert(child_key.clone(), deltas);

            // Copy parent permissions the child does not shadow.
            let parent_objects: Vec<String> = tables
                .objects
                .get(&parent_key)
                .map(|set| set.iter().map(str::to_string).collect())
                .unwrap_or_default();
            for object in parent_objects {
                let perm_key = (role.clone(), child.clone(), object.clone());
                if tables.perms.contains_key(&perm_key) {
                    continue;
                }
                let Some(perm) = tables
                    .perms
                    .get(&(role.clone(), parent.clone(), object.clone()))
                    .cloned()
                else {
                    continue;
                };
                tables.perms.insert(perm_key, perm);
                tables
                    .objects
                    .entry(child_key.clone())
                    .or_default()
                    .insert(&object);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand_domains;
    use crate::parser::parse_policy;
    use gran_core::Capability;

    fn tables(text: &str) -> PolicyTables {
        let mut t =
            crate::build::build_tables(&expand_domains(parse_policy(text).unwrap())).unwrap();
        apply_inheritance(&mut t);
        t
    }

    #[test]
    fn test_child_inherits_parent_permissions() {
        let text = "role r u\nsubject /usr\n\t/etc/passwd r\n\t/ h\nsubject /usr/bin\n\t/ h\n";
        let t = tables(text);
        assert_eq!(t.perm("r", "/usr/bin", "/etc/passwd"), Some("r"));
    }

    #[test]
    fn test_child_entries_win() {
        let text = "role r u\nsubject /usr\n\t/etc r\n\t/ h\nsubject /usr/bin\n\t/etc rw\n\t/ h\n";
        let t = tables(text);
        assert_eq!(t.perm("r", "/usr/bin", "/etc"), Some("rw"));
    }

    #[test]
    fn test_override_flag_blocks_inheritance() {
        let text = "role r u\nsubject /usr\n\t/etc r\n\t/ h\nsubject /usr/bin o\n\t/ h\n";
        let t = tables(text);
        assert_eq!(t.perm("r", "/usr/bin", "/etc"), None);
    }

    #[test]
    fn test_caps_concatenate_parent_then_child() {
        // Parent drops everything; child adds SETUID back.
        let text = "role r u\nsubject /\n\t/ h\n-CAP_ALL\nsubject /usr\n\t/ h\n+CAP_SETUID\n";
        let t = tables(text);
        let caps = t.caps_of("r", "/usr").unwrap();
        assert!(caps.contains(&Capability::SetUid));
        assert!(!caps.contains(&Capability::SetGid));
    }

    #[test]
    fn test_inheritance_is_transitive() {
        let text = "role r u\nsubject /\n\t/etc/shadow r\n\t/ h\n\
                    subject /usr\n\t/ h\nsubject /usr/bin\n\t/ h\n";
        let t = tables(text);
        // /usr inherits from /, then /usr/bin inherits the copy.
        assert_eq!(t.perm("r", "/usr/bin", "/etc/shadow"), Some("r"));
    }

    #[test]
    fn test_glob_parent_matches() {
        let text = "role r u\nsubject /usr/*\n\t/etc r\n\t/ h\nsubject /usr/bin/sh\n\t/ h\n";
        let t = tables(text);
        assert_eq!(t.perm("r", "/usr/bin/sh", "/etc"), Some("r"));
    }

    #[test]
    fn test_empty_perm_shadows_parent() {
        // The child's bare /etc entry revokes the parent's grant.
        let text = "role r u\nsubject /usr\n\t/etc r\n\t/ h\nsubject /usr/bin\n\t/etc\n\t/ h\n";
        let t = tables(text);
        assert_eq!(t.perm("r", "/usr/bin", "/etc"), Some(""));
    }
}
