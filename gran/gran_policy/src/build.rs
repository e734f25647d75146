//! Permission table builder.
//!
//! Walks the expanded role declarations and materialises the lookup
//! tables the transition builder and the flow predicates run on. The
//! tables are frozen after the inheritance closure; everything
//! downstream reads them through `&PolicyTables`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use gran_core::{
    cap_compute, CapDelta, Capability, ParseError, PathSet, Result, RoleDecl, RoleHead, RoleKind,
    SemanticError, TransPolicy, DONTCARE,
};

/// Kind and flags of a declared role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleInfo {
    pub kind: RoleKind,
    pub admin: bool,
}

/// The compiled policy: every table the analysis needs, keyed by role
/// name and subject path.
#[derive(Debug, Default)]
pub struct PolicyTables {
    /// Role name to kind and administrative flag.
    pub roles: BTreeMap<String, RoleInfo>,

    /// Role name to permitted role-transition targets.
    pub role_transitions: BTreeMap<String, Vec<String>>,

    /// Role name to subject path to mode string.
    pub role_subjects: BTreeMap<String, BTreeMap<String, String>>,

    /// Role name to its subject paths, pre-compiled for matching.
    pub subject_paths: BTreeMap<String, PathSet>,

    /// `(role, subject, object)` to permission string.
    pub perms: HashMap<(String, String, String), String>,

    /// `(role, subject)` to its object paths, pre-compiled for
    /// greatest-matching-path lookups.
    pub objects: HashMap<(String, String), PathSet>,

    /// `(role, subject)` to capability deltas in declaration order.
    /// Inheritance prepends the parent's list.
    pub caps: HashMap<(String, String), Vec<CapDelta>>,

    /// `(role, subject)` to the effective capability set.
    pub eff_caps: HashMap<(String, String), BTreeSet<Capability>>,

    /// `(role, subject)` to the user roles reachable by set-UID.
    pub user_trans: HashMap<(String, String), BTreeSet<String>>,

    /// `(role, subject)` to the group roles reachable by set-GID.
    pub grp_trans: HashMap<(String, String), BTreeSet<String>>,

    /// Union of subject paths across all roles.
    pub all_subjects: PathSet,

    pub special_roles: Vec<String>,
    pub user_roles: Vec<String>,
    pub group_roles: Vec<String>,

    /// Roles carrying the administrative flag.
    pub admin_roles: BTreeSet<String>,
}

impl PolicyTables {
    /// Permission string for an exact `(role, subject, object)` entry.
    pub fn perm(&self, role: &str, subject: &str, object: &str) -> Option<&str> {
        self.perms
            .get(&(role.to_string(), subject.to_string(), object.to_string()))
            .map(String::as_str)
    }

    /// Object paths declared (or inherited) for `(role, subject)`.
    pub fn objects_of(&self, role: &str, subject: &str) -> Option<&PathSet> {
        self.objects.get(&(role.to_string(), subject.to_string()))
    }

    /// Effective capabilities of `(role, subject)`.
    pub fn caps_of(&self, role: &str, subject: &str) -> Option<&BTreeSet<Capability>> {
        self.eff_caps.get(&(role.to_string(), subject.to_string()))
    }

    pub fn user_trans_of(&self, role: &str, subject: &str) -> Option<&BTreeSet<String>> {
        self.user_trans.get(&(role.to_string(), subject.to_string()))
    }

    pub fn grp_trans_of(&self, role: &str, subject: &str) -> Option<&BTreeSet<String>> {
        self.grp_trans.get(&(role.to_string(), subject.to_string()))
    }

    /// Map a concrete path to the governing subject of `role` through
    /// greatest-matching-path lookup.
    pub fn match_subject(&self, role: &str, path: &str) -> Result<&str> {
        self.subject_paths
            .get(role)
            .and_then(|set| set.gmp(path))
            .ok_or_else(|| {
                SemanticError::NoSubjectMatch {
                    role: role.to_string(),
                    subject: path.to_string(),
                }
                .into()
            })
    }

    /// Kind of a declared role.
    pub fn kind_of(&self, role: &str) -> Option<RoleKind> {
        self.roles.get(role).map(|info| info.kind)
    }
}

/// Build the tables from expanded role declarations.
pub fn build_tables(decls: &[RoleDecl]) -> Result<PolicyTables> {
    let mut tables = PolicyTables::default();

    // Later declarations of the same role name replace earlier ones.
    let mut by_name: Vec<(&str, &RoleDecl)> = Vec::new();
    for decl in decls {
        let name = match &decl.head {
            RoleHead::Name(n) => n.as_str(),
            RoleHead::UserSet(_) => {
                return Err(ParseError::Syntax(
                    "domain survived expansion".to_string(),
                )
                .into())
            }
        };
        if let Some(slot) = by_name.iter_mut().find(|(n, _)| *n == name) {
            warn!(role = name, "duplicate role declaration; last wins");
            slot.1 = decl;
        } else {
            by_name.push((name, decl));
        }
    }

    for (name, decl) in &by_name {
        let kind = decl.kind()?;
        tables.roles.insert(
            name.to_string(),
            RoleInfo {
                kind,
                admin: decl.admin(),
            },
        );
        match kind {
            RoleKind::Special => tables.special_roles.push(name.to_string()),
            RoleKind::User => tables.user_roles.push(name.to_string()),
            RoleKind::Group => tables.group_roles.push(name.to_string()),
            RoleKind::Default => {}
        }
        if decl.admin() {
            tables.admin_roles.insert(name.to_string());
        }
    }
    tables.special_roles.sort();
    tables.user_roles.sort();
    tables.group_roles.sort();

    for (name, decl) in &by_name {
        let role = name.to_string();
        tables
            .role_transitions
            .insert(role.clone(), decl.transitions.clone());

        let subjects = tables.role_subjects.entry(role.clone()).or_default();
        let paths = tables.subject_paths.entry(role.clone()).or_default();
        for subject in &decl.subjects {
            if subjects.contains_key(&subject.path) {
                warn!(role = %role, subject = %subject.path, "duplicate subject path; last wins");
            }
            subjects.insert(subject.path.clone(), subject.mode.clone());
            paths.insert(&subject.path);
            tables.all_subjects.insert(&subject.path);

            let key = (role.clone(), subject.path.clone());
            tables.caps.insert(key.clone(), subject.caps.clone());
            tables
                .eff_caps
                .insert(key.clone(), cap_compute(&subject.caps));

            let objects = tables.objects.entry(key.clone()).or_default();
            for object in &subject.objects {
                objects.insert(&object.path);
                tables.perms.insert(
                    (role.clone(), subject.path.clone(), object.path.clone()),
                    object.perms.clone(),
                );
            }

            tables.user_trans.insert(
                key.clone(),
                allowed_set(&subject.user_trans, &tables.user_roles),
            );
            tables.grp_trans.insert(
                key.clone(),
                allowed_set(&subject.group_trans, &tables.group_roles),
            );
        }
    }

    debug!(
        roles = tables.roles.len(),
        subjects = tables.all_subjects.len(),
        perms = tables.perms.len(),
        "policy tables built"
    );
    Ok(tables)
}

/// Resolve a transition policy to the set of reachable role names.
///
/// An unspecified policy permits every role of the kind plus
/// [`DONTCARE`]. An allow clause is intersected with the declared
/// roles; naming anything undeclared additionally permits
/// [`DONTCARE`]. A deny clause subtracts from the universal set.
fn allowed_set(policy: &TransPolicy, all: &[String]) -> BTreeSet<String> {
    match policy {
        TransPolicy::Unspecified => {
            let mut set: BTreeSet<String> = all.iter().cloned().collect();
            set.insert(DONTCARE.to_string());
            set
        }
        TransPolicy::Allow(names) => {
            let mut set: BTreeSet<String> = names
                .iter()
                .filter(|n| all.contains(*n))
                .cloned()
                .collect();
            if names.iter().any(|n| !all.contains(n)) {
                set.insert(DONTCARE.to_string());
            }
            set
        }
        TransPolicy::Deny(names) => {
            let mut set: BTreeSet<String> = all.iter().cloned().collect();
            set.insert(DONTCARE.to_string());
            for name in names {
                set.remove(name);
            }
            set
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::expand_domains;
    use crate::parser::parse_policy;

    fn tables(text: &str) -> PolicyTables {
        build_tables(&expand_domains(parse_policy(text).unwrap())).unwrap()
    }

    #[test]
    fn test_empty_policy_builds_empty_tables() {
        let t = tables("");
        assert!(t.roles.is_empty());
        assert!(t.perms.is_empty());
        assert!(t.all_subjects.is_empty());
    }

    #[test]
    fn test_perm_and_object_tables() {
        let t = tables("role r u\nsubject /\n\t/etc r\n\t/etc/shadow rh\n");
        assert_eq!(t.perm("r", "/", "/etc"), Some("r"));
        assert_eq!(t.perm("r", "/", "/etc/shadow"), Some("rh"));
        assert_eq!(t.perm("r", "/", "/bin"), None);
        let objects = t.objects_of("r", "/").unwrap();
        assert_eq!(objects.len(), 2);
    }

    #[test]
    fn test_unspecified_transitions_are_universal() {
        let t = tables("role a u\nsubject /\n\t/ h\nrole b u\nsubject /\n\t/ h\n");
        let set = t.user_trans_of("a", "/").unwrap();
        assert!(set.contains("a"));
        assert!(set.contains("b"));
        assert!(set.contains(DONTCARE));
    }

    #[test]
    fn test_allow_clause_intersects_user_roles() {
        let text = "role a u\nsubject /\nuser_transition_allow b nobody\n\t/ h\n\
                    role b u\nsubject /\n\t/ h\n";
        let t = tables(text);
        let set = t.user_trans_of("a", "/").unwrap();
        assert!(set.contains("b"));
        assert!(!set.contains("nobody"));
        // An undeclared name keeps the wildcard reachable.
        assert!(set.contains(DONTCARE));
    }

    #[test]
    fn test_allow_clause_of_declared_roles_only() {
        let text = "role a u\nsubject /\nuser_transition_allow b\n\t/ h\n\
                    role b u\nsubject /\n\t/ h\n";
        let t = tables(text);
        let set = t.user_trans_of("a", "/").unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains("b"));
    }

    #[test]
    fn test_deny_clause_subtracts() {
        let text = "role a u\nsubject /\nuser_transition_deny b\n\t/ h\n\
                    role b u\nsubject /\n\t/ h\n";
        let t = tables(text);
        let set = t.user_trans_of("a", "/").unwrap();
        assert!(!set.contains("b"));
        assert!(set.contains("a"));
        assert!(set.contains(DONTCARE));
    }

    #[test]
    fn test_effective_caps_from_deltas() {
        let t = tables("role r u\nsubject /\n\t/ h\n-CAP_ALL\n+CAP_SETGID\n");
        let caps = t.caps_of("r", "/").unwrap();
        assert!(caps.contains(&Capability::SetGid));
        assert!(!caps.contains(&Capability::SetUid));
    }

    #[test]
    fn test_match_subject_longest_prefix() {
        let t = tables("role r u\nsubject /\n\t/ h\nsubject /usr/bin\n\t/ h\n");
        assert_eq!(t.match_subject("r", "/usr/bin/sh").unwrap(), "/usr/bin");
        assert_eq!(t.match_subject("r", "/etc/passwd").unwrap(), "/");
        assert!(t.match_subject("missing", "/").is_err());
    }

    #[test]
    fn test_domain_users_become_roles() {
        let t = tables("domain friends u alice bob\nsubject /\n\t/etc r\n");
        assert_eq!(t.user_roles, vec!["alice", "bob"]);
        assert_eq!(t.perm("alice", "/", "/etc"), Some("r"));
        assert_eq!(t.perm("bob", "/", "/etc"), Some("r"));
    }

    #[test]
    fn test_admin_roles_collected() {
        let t = tables("role admin sA\nsubject /\n\t/ h\nrole user u\nsubject /\n\t/ h\n");
        assert!(t.admin_roles.contains("admin"));
        assert!(!t.admin_roles.contains("user"));
    }
}
