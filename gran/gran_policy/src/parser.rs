//! Fold the flat statement list into role declarations.
//!
//! The grammar accepts statements in any order; structure is implied:
//! a `role`/`domain` line opens a role, a `subject` line opens a
//! subject inside it, and everything else attaches to the innermost
//! open declaration. Statements outside their scope are errors.

use pest::iterators::Pair;
use pest::Parser;
use tracing::debug;

use gran_core::{
    CapDelta, CapTarget, Capability, ObjectDecl, ParseError, Result, RoleDecl, RoleHead,
    SubjectDecl, TransPolicy,
};

use crate::grammar::{PolicyParser, Rule};

/// Parse preprocessed policy text into role declarations.
pub fn parse_policy(text: &str) -> Result<Vec<RoleDecl>> {
    let mut pairs = PolicyParser::parse(Rule::policy, text)
        .map_err(|e| ParseError::Syntax(e.to_string()))?;
    let policy = pairs.next().expect("grammar yields one policy pair");

    let mut roles: Vec<RoleDecl> = Vec::new();
    let mut role: Option<RoleDecl> = None;
    let mut subject: Option<SubjectDecl> = None;

    for stmt in policy.into_inner() {
        match stmt.as_rule() {
            Rule::role_stmt => {
                flush_role(&mut roles, &mut role, &mut subject);
                let idents = idents_of(stmt);
                role = Some(RoleDecl::new(
                    RoleHead::Name(idents[0].clone()),
                    idents.get(1).cloned().unwrap_or_default(),
                ));
            }
            Rule::domain_stmt => {
                flush_role(&mut roles, &mut role, &mut subject);
                let idents = idents_of(stmt);
                debug!(domain = %idents[0], users = idents.len() - 2, "domain declaration");
                role = Some(RoleDecl::new(
                    RoleHead::UserSet(idents[2..].to_vec()),
                    idents[1].clone(),
                ));
            }
            Rule::transitions_stmt => {
                let role = in_role(&mut role, "role_transitions")?;
                role.transitions.extend(idents_of(stmt));
            }
            Rule::subject_stmt => {
                flush_subject(&mut role, &mut subject)?;
                in_role(&mut role, "subject")?;
                let (path, nested, mode) = subject_parts(stmt);
                if let Some(nested) = nested {
                    return Err(ParseError::Unsupported(format!(
                        "nested subject path {}:{}",
                        path, nested
                    ))
                    .into());
                }
                subject = Some(SubjectDecl::new(path, mode.unwrap_or_default()));
            }
            Rule::user_allow_stmt => {
                set_user_trans(&mut subject, TransPolicy::Allow(idents_of(stmt)))?;
            }
            Rule::user_deny_stmt => {
                set_user_trans(&mut subject, TransPolicy::Deny(idents_of(stmt)))?;
            }
            Rule::group_allow_stmt => {
                set_group_trans(&mut subject, TransPolicy::Allow(idents_of(stmt)))?;
            }
            Rule::group_deny_stmt => {
                set_group_trans(&mut subject, TransPolicy::Deny(idents_of(stmt)))?;
            }
            Rule::cap_stmt => {
                let subject = in_subject(&mut subject, "capability")?;
                if let Some(delta) = parse_cap(stmt.as_str().trim()) {
                    subject.caps.push(delta);
                }
            }
            Rule::object_stmt => {
                let subject = in_subject(&mut subject, "object")?;
                let mut inner = stmt.into_inner();
                let path = inner.next().expect("object has a path").as_str().to_string();
                let perms = inner
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                subject.objects.push(ObjectDecl { path, perms });
            }
            // Tokenised but semantically irrelevant: PaX flags, resource
            // limits, socket ACLs.
            Rule::pax_stmt
            | Rule::res_stmt
            | Rule::connect_stmt
            | Rule::bind_stmt
            | Rule::sock_family_stmt
            | Rule::ip_override_stmt => {}
            Rule::EOI => {}
            other => {
                return Err(
                    ParseError::Syntax(format!("unexpected statement {:?}", other)).into(),
                );
            }
        }
    }
    flush_role(&mut roles, &mut role, &mut subject);
    Ok(roles)
}

fn idents_of(pair: Pair<'_, Rule>) -> Vec<String> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::ident)
        .map(|p| p.as_str().to_string())
        .collect()
}

fn subject_parts(pair: Pair<'_, Rule>) -> (String, Option<String>, Option<String>) {
    let mut path = String::new();
    let mut nested = None;
    let mut mode = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::path => path = inner.as_str().to_string(),
            Rule::nested_path => {
                nested = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::path)
                    .map(|p| p.as_str().to_string());
            }
            Rule::ident => mode = Some(inner.as_str().to_string()),
            _ => {}
        }
    }
    (path, nested, mode)
}

/// Parse a `+CAP_X`/`-CAP_X` token. Capabilities outside the tracked
/// universe are discarded.
fn parse_cap(token: &str) -> Option<CapDelta> {
    let add = token.starts_with('+');
    let name = &token[1..];
    if name == "CAP_ALL" {
        return Some(CapDelta {
            add,
            target: CapTarget::All,
        });
    }
    match Capability::parse(name) {
        Some(cap) => Some(CapDelta {
            add,
            target: CapTarget::One(cap),
        }),
        None => {
            debug!(cap = name, "untracked capability discarded");
            None
        }
    }
}

fn set_user_trans(subject: &mut Option<SubjectDecl>, policy: TransPolicy) -> Result<()> {
    let subject = in_subject(subject, "user_transition")?;
    if subject.user_trans != TransPolicy::Unspecified {
        debug!(subject = %subject.path, "user transition clause overridden; last wins");
    }
    subject.user_trans = policy;
    Ok(())
}

fn set_group_trans(subject: &mut Option<SubjectDecl>, policy: TransPolicy) -> Result<()> {
    let subject = in_subject(subject, "group_transition")?;
    if subject.group_trans != TransPolicy::Unspecified {
        debug!(subject = %subject.path, "group transition clause overridden; last wins");
    }
    subject.group_trans = policy;
    Ok(())
}

fn in_role<'a>(role: &'a mut Option<RoleDecl>, stmt: &str) -> Result<&'a mut RoleDecl> {
    role.as_mut().ok_or_else(|| {
        ParseError::Misplaced {
            stmt: stmt.to_string(),
            scope: "role".to_string(),
        }
        .into()
    })
}

fn in_subject<'a>(subject: &'a mut Option<SubjectDecl>, stmt: &str) -> Result<&'a mut SubjectDecl> {
    subject.as_mut().ok_or_else(|| {
        ParseError::Misplaced {
            stmt: stmt.to_string(),
            scope: "subject".to_string(),
        }
        .into()
    })
}

fn flush_subject(role: &mut Option<RoleDecl>, subject: &mut Option<SubjectDecl>) -> Result<()> {
    if let Some(finished) = subject.take() {
        in_role(role, "subject")?.subjects.push(finished);
    }
    Ok(())
}

fn flush_role(
    roles: &mut Vec<RoleDecl>,
    role: &mut Option<RoleDecl>,
    subject: &mut Option<SubjectDecl>,
) {
    if let Some(finished) = subject.take() {
        role.as_mut()
            .expect("subject is only open inside a role")
            .subjects
            .push(finished);
    }
    if let Some(finished) = role.take() {
        roles.push(finished);
    }
}
