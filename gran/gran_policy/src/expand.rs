//! Domain expansion.
//!
//! A `domain` binds a set of user names to one shared policy body.
//! The analysis works on roles, so each domain becomes one role per
//! bound user, all sharing the domain's transitions and subjects.

use gran_core::{RoleDecl, RoleHead};

/// Split every domain declaration into per-user roles.
pub fn expand_domains(decls: Vec<RoleDecl>) -> Vec<RoleDecl> {
    let mut out = Vec::with_capacity(decls.len());
    for decl in decls {
        match decl.head {
            RoleHead::Name(_) => out.push(decl),
            RoleHead::UserSet(users) => {
                for user in users {
                    out.push(RoleDecl {
                        head: RoleHead::Name(user),
                        mode: decl.mode.clone(),
                        transitions: decl.transitions.clone(),
                        subjects: decl.subjects.clone(),
                    });
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gran_core::{RoleKind, SubjectDecl};

    #[test]
    fn test_plain_roles_untouched() {
        let decls = vec![RoleDecl::new(RoleHead::Name("admin".into()), "s")];
        let out = expand_domains(decls.clone());
        assert_eq!(out, decls);
    }

    #[test]
    fn test_domain_splits_per_user() {
        let mut domain = RoleDecl::new(
            RoleHead::UserSet(vec!["alice".into(), "bob".into()]),
            "u",
        );
        domain.transitions.push("admin".into());
        domain.subjects.push(SubjectDecl::new("/", ""));

        let out = expand_domains(vec![domain]);
        assert_eq!(out.len(), 2);
        for (role, name) in out.iter().zip(["alice", "bob"]) {
            assert_eq!(role.head, RoleHead::Name(name.into()));
            assert_eq!(role.kind().unwrap(), RoleKind::User);
            assert_eq!(role.transitions, vec!["admin"]);
            assert_eq!(role.subjects.len(), 1);
        }
    }

    #[test]
    fn test_expansion_yields_distinct_names() {
        let domain = RoleDecl::new(
            RoleHead::UserSet(vec!["alice".into(), "bob".into(), "carol".into()]),
            "u",
        );
        let out = expand_domains(vec![domain]);
        let mut names: Vec<_> = out
            .iter()
            .map(|r| match &r.head {
                RoleHead::Name(n) => n.clone(),
                RoleHead::UserSet(_) => unreachable!("expansion leaves no user sets"),
            })
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 3);
    }
}
