//! Policy AST and RBAC state model.
//!
//! The parser produces [`RoleDecl`] values; the table builder and the
//! transition graph consume them. Everything here is plain data with
//! value semantics.

use std::fmt;

use serde::Serialize;

use crate::error::ParseError;

/// Sentinel role name meaning "any role or none".
///
/// It stands in for an unset slot of a [`State`] and models universal
/// user/group transitions.
pub const DONTCARE: &str = "_";

/// The kind of a role. Every role has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RoleKind {
    Special,
    User,
    Group,
    Default,
}

impl RoleKind {
    /// Upper-case letter used when rendering states.
    pub fn letter(self) -> char {
        match self {
            RoleKind::Special => 'S',
            RoleKind::User => 'U',
            RoleKind::Group => 'G',
            RoleKind::Default => 'D',
        }
    }

    /// Map a mode-string flag to a kind, if it is a kind flag.
    pub fn from_flag(flag: char) -> Option<Self> {
        match flag {
            's' => Some(RoleKind::Special),
            'u' => Some(RoleKind::User),
            'g' => Some(RoleKind::Group),
            _ => None,
        }
    }
}

/// A capability the analysis tracks.
///
/// Only the two capabilities that gate identity transitions are
/// semantically relevant; all others are parsed and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Capability {
    SetUid,
    SetGid,
}

impl Capability {
    /// The tracked capability universe.
    pub const ALL: [Capability; 2] = [Capability::SetUid, Capability::SetGid];

    /// Parse a `CAP_*` name. Names outside the universe yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "CAP_SETUID" => Some(Capability::SetUid),
            "CAP_SETGID" => Some(Capability::SetGid),
            _ => None,
        }
    }
}

/// What a capability delta applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapTarget {
    /// `CAP_ALL`: the whole tracked universe.
    All,
    One(Capability),
}

/// A single `+CAP_X` / `-CAP_X` line of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapDelta {
    pub add: bool,
    pub target: CapTarget,
}

/// Per-subject user- or group-transition policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransPolicy {
    /// No clause: any role of the respective kind, or none.
    #[default]
    Unspecified,
    Allow(Vec<String>),
    Deny(Vec<String>),
}

/// An object declaration: a path and its permission string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDecl {
    pub path: String,
    /// May be empty: a bare path revokes whatever a broader entry
    /// grants, through greatest-matching-path shadowing.
    pub perms: String,
}

/// A subject declaration inside a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectDecl {
    pub path: String,
    /// Raw mode flags; `o` disables inheritance.
    pub mode: String,
    pub user_trans: TransPolicy,
    pub group_trans: TransPolicy,
    /// Capability deltas in declaration order.
    pub caps: Vec<CapDelta>,
    pub objects: Vec<ObjectDecl>,
}

impl SubjectDecl {
    pub fn new(path: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: mode.into(),
            user_trans: TransPolicy::Unspecified,
            group_trans: TransPolicy::Unspecified,
            caps: Vec::new(),
            objects: Vec::new(),
        }
    }

    /// Whether the subject opts out of inheritance.
    pub fn overrides(&self) -> bool {
        self.mode.contains('o')
    }
}

/// The head of a role declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleHead {
    Name(String),
    /// A `domain` binds a set of user names; the expander splits it
    /// into one role per user.
    UserSet(Vec<String>),
}

/// A parsed role or domain declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDecl {
    pub head: RoleHead,
    /// Raw mode flags; one of `s`/`u`/`g` picks the kind, `A` marks
    /// the role administrative.
    pub mode: String,
    pub transitions: Vec<String>,
    pub subjects: Vec<SubjectDecl>,
}

impl RoleDecl {
    pub fn new(head: RoleHead, mode: impl Into<String>) -> Self {
        Self {
            head,
            mode: mode.into(),
            transitions: Vec::new(),
            subjects: Vec::new(),
        }
    }

    /// Derive the role kind from the mode flags.
    ///
    /// A role named `default` with no kind flag is the default role;
    /// anything else must carry exactly one of `s`/`u`/`g`.
    pub fn kind(&self) -> Result<RoleKind, ParseError> {
        let kinds: Vec<RoleKind> = self.mode.chars().filter_map(RoleKind::from_flag).collect();
        let name = match &self.head {
            RoleHead::Name(n) => n.as_str(),
            RoleHead::UserSet(_) => "<domain>",
        };
        match kinds.as_slice() {
            [k] => Ok(*k),
            [] if name == "default" => Ok(RoleKind::Default),
            _ => Err(ParseError::RoleKind {
                role: name.to_string(),
                count: kinds.len(),
            }),
        }
    }

    /// Whether the role carries the administrative flag.
    pub fn admin(&self) -> bool {
        self.mode.contains('A')
    }
}

/// Label on a transition edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Label {
    SetRole(String),
    SetUid(String),
    SetGid(String),
    Exec(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::SetRole(r) => write!(f, "set_role({})", r),
            Label::SetUid(u) => write!(f, "set_UID({})", u),
            Label::SetGid(g) => write!(f, "set_GID({})", g),
            Label::Exec(p) => write!(f, "exec({})", p),
        }
    }
}

/// An RBAC state: which roles are active and which subject executes.
///
/// Each of the first three slots holds a role name of the respective
/// kind, or [`DONTCARE`]. The subject is a filesystem path resolved
/// per effective role through greatest-matching-path lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct State {
    pub special: String,
    pub user: String,
    pub group: String,
    pub subject: String,
}

impl State {
    pub fn new(
        special: impl Into<String>,
        user: impl Into<String>,
        group: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            special: special.into(),
            user: user.into(),
            group: group.into(),
            subject: subject.into(),
        }
    }

    pub fn with_special(&self, special: impl Into<String>) -> Self {
        Self {
            special: special.into(),
            ..self.clone()
        }
    }

    pub fn with_user(&self, user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..self.clone()
        }
    }

    pub fn with_group(&self, group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..self.clone()
        }
    }

    pub fn with_subject(&self, subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..self.clone()
        }
    }
}

/// Access mode checked by the flow predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessMode {
    Read,
    Write,
    Exec,
}

impl AccessMode {
    /// Whether a permission string grants this mode.
    ///
    /// `h` hides the object and suppresses every grant; any of
    /// `w`/`a`/`c` makes an object writable.
    pub fn allowed_by(self, perms: &str) -> bool {
        if perms.contains('h') {
            return false;
        }
        match self {
            AccessMode::Read => perms.contains('r'),
            AccessMode::Write => perms.contains(['w', 'a', 'c']),
            AccessMode::Exec => perms.contains('x'),
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Read => write!(f, "read"),
            AccessMode::Write => write!(f, "write"),
            AccessMode::Exec => write!(f, "exec"),
        }
    }
}

/// Effective capability set after processing deltas in order.
///
/// The computation starts from the full tracked universe; `CAP_ALL`
/// adds or removes everything at once.
pub fn cap_compute(deltas: &[CapDelta]) -> std::collections::BTreeSet<Capability> {
    let mut set: std::collections::BTreeSet<Capability> = Capability::ALL.into_iter().collect();
    for delta in deltas {
        match (delta.add, delta.target) {
            (true, CapTarget::All) => {
                set.extend(Capability::ALL);
            }
            (false, CapTarget::All) => {
                set.clear();
            }
            (true, CapTarget::One(cap)) => {
                set.insert(cap);
            }
            (false, CapTarget::One(cap)) => {
                set.remove(&cap);
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_kind_from_flags() {
        let role = RoleDecl::new(RoleHead::Name("admin".into()), "sA");
        assert_eq!(role.kind().unwrap(), RoleKind::Special);
        assert!(role.admin());

        let role = RoleDecl::new(RoleHead::Name("default".into()), "");
        assert_eq!(role.kind().unwrap(), RoleKind::Default);

        let role = RoleDecl::new(RoleHead::Name("broken".into()), "sug");
        assert!(role.kind().is_err());

        let role = RoleDecl::new(RoleHead::Name("nokind".into()), "A");
        assert!(role.kind().is_err());
    }

    #[test]
    fn test_cap_compute_starts_full() {
        assert_eq!(cap_compute(&[]).len(), 2);
    }

    #[test]
    fn test_cap_compute_deltas_in_order() {
        let deltas = vec![
            CapDelta {
                add: false,
                target: CapTarget::All,
            },
            CapDelta {
                add: true,
                target: CapTarget::One(Capability::SetUid),
            },
        ];
        let caps = cap_compute(&deltas);
        assert!(caps.contains(&Capability::SetUid));
        assert!(!caps.contains(&Capability::SetGid));

        // The same deltas reversed drop everything.
        let deltas: Vec<CapDelta> = deltas.into_iter().rev().collect();
        assert!(cap_compute(&deltas).is_empty());
    }

    #[test]
    fn test_access_mode_hidden_wins() {
        assert!(AccessMode::Read.allowed_by("r"));
        assert!(!AccessMode::Read.allowed_by("rh"));
        assert!(AccessMode::Write.allowed_by("a"));
        assert!(AccessMode::Write.allowed_by("c"));
        assert!(!AccessMode::Write.allowed_by("r"));
        assert!(!AccessMode::Exec.allowed_by("xh"));
        assert!(!AccessMode::Read.allowed_by(""));
    }

    #[test]
    fn test_label_display() {
        assert_eq!(Label::SetRole("admin".into()).to_string(), "set_role(admin)");
        assert_eq!(Label::SetUid("alice".into()).to_string(), "set_UID(alice)");
        assert_eq!(Label::Exec("/bin/sh".into()).to_string(), "exec(/bin/sh)");
    }
}
