//! Effective-role resolution and state rendering.

use gran_core::{RoleKind, State, DONTCARE};
use gran_policy::PolicyTables;

/// The effective role of a state: scan special, user, group in order
/// and take the first named role of kind special/user/group; if every
/// slot is unset, the default role governs.
pub fn effective_role<'a>(tables: &'a PolicyTables, state: &'a State) -> (&'a str, RoleKind) {
    for slot in [&state.special, &state.user, &state.group] {
        if slot.as_str() == DONTCARE {
            continue;
        }
        if let Some(kind) = tables.kind_of(slot) {
            if matches!(kind, RoleKind::Special | RoleKind::User | RoleKind::Group) {
                return (slot.as_str(), kind);
            }
        }
    }
    ("default", RoleKind::Default)
}

/// Render a state as `role:KIND:subject`.
pub fn render_state(tables: &PolicyTables, state: &State) -> String {
    let (role, kind) = effective_role(tables, state);
    format!("{}:{}:{}", role, kind.letter(), state.subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gran_policy::compile_text;

    fn tables() -> PolicyTables {
        compile_text(
            "role default\nsubject /\n\t/ h\n\
             role admin s\nsubject /\n\t/ h\n\
             role alice u\nsubject /\n\t/ h\n\
             role wheel g\nsubject /\n\t/ h\n",
        )
        .unwrap()
    }

    #[test]
    fn test_scan_order_special_first() {
        let t = tables();
        let state = State::new("admin", "alice", "wheel", "/");
        assert_eq!(effective_role(&t, &state), ("admin", RoleKind::Special));
    }

    #[test]
    fn test_skips_unset_slots() {
        let t = tables();
        let state = State::new("_", "alice", "wheel", "/");
        assert_eq!(effective_role(&t, &state), ("alice", RoleKind::User));
        let state = State::new("_", "_", "wheel", "/");
        assert_eq!(effective_role(&t, &state), ("wheel", RoleKind::Group));
    }

    #[test]
    fn test_all_unset_is_default() {
        let t = tables();
        let state = State::new("_", "_", "_", "/bin/sh");
        assert_eq!(effective_role(&t, &state), ("default", RoleKind::Default));
    }

    #[test]
    fn test_render() {
        let t = tables();
        assert_eq!(
            render_state(&t, &State::new("_", "alice", "_", "/bin/sh")),
            "alice:U:/bin/sh"
        );
        assert_eq!(
            render_state(&t, &State::new("_", "_", "_", "/")),
            "default:D:/"
        );
    }
}
