//! # Gran Analysis
//!
//! `gran_analysis` materialises the reachable RBAC state space of a
//! compiled policy and searches it for information flows. The
//! [`Analysis`] value owns the permission tables and the completed
//! transition graph; every search reads it immutably, so flow
//! procedures can run in any order (or, with outer plumbing, in
//! parallel) once construction finishes.
//!
//! Key concepts:
//!
//! 1. **Transition graph**: labelled edges between
//!    `(special, user, group, subject)` states under role change,
//!    set-UID/GID, and exec semantics.
//!
//! 2. **Blacklist**: administrative roles are never entered unless the
//!    operator opts in.
//!
//! 3. **Flows**: direct (a target readable or writable along a walk),
//!    indirect (write by one actor, read by another, through an
//!    intermediate object), and write–execute (one object both
//!    writable and executable from the same entry point).

pub mod flows;
pub mod graph;
pub mod reach;
pub mod state;

use std::collections::BTreeSet;

use gran_core::{AccessMode, Result, State};
use gran_policy::PolicyTables;

pub use flows::{DirectFinding, FlowHit, IndirectFinding, TraceStep, WriteExecFinding};
pub use graph::TransitionGraph;
pub use reach::{EdgeTrace, Trace};
pub use state::{effective_role, render_state};

/// Switches the operator controls on the CLI surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisOptions {
    /// Keep administrative roles reachable.
    pub admin: bool,
    /// Assume no set-UID/GID binaries: exec keeps the current
    /// identity.
    pub best_case: bool,
}

/// A compiled policy together with its completed transition graph.
///
/// Constructed once, then read-only.
pub struct Analysis {
    pub tables: PolicyTables,
    pub graph: TransitionGraph,
    pub blacklist: BTreeSet<String>,
    pub best_case: bool,
}

impl Analysis {
    /// Build the transition graph over `tables`.
    ///
    /// # Arguments
    ///
    /// * `tables` - The compiled policy.
    /// * `options` - Operator switches for blacklisting and exec mode.
    /// * `seeds` - Extra initial states (entry points whose subject
    ///   path is not a declared subject) to materialise alongside the
    ///   full role/subject product.
    ///
    /// # Returns
    ///
    /// The analysis value, ready for flow searches.
    pub fn build(tables: PolicyTables, options: AnalysisOptions, seeds: &[State]) -> Result<Self> {
        let blacklist = if options.admin {
            BTreeSet::new()
        } else {
            tables.admin_roles.clone()
        };
        let graph = graph::build_graph(&tables, &blacklist, options.best_case, seeds)?;
        Ok(Self {
            tables,
            graph,
            blacklist,
            best_case: options.best_case,
        })
    }

    /// Permission string governing `object` from `state`, through the
    /// state's effective role, matched subject, and the
    /// greatest-matching object path. `None` means not permitted.
    pub fn perm_for(&self, state: &State, object: &str) -> Option<&str> {
        let (role, _) = state::effective_role(&self.tables, state);
        let sc = self.tables.match_subject(role, &state.subject).ok()?;
        let governing = self.tables.objects_of(role, sc)?.gmp(object)?;
        self.tables.perm(role, sc, governing)
    }

    /// Whether `state` may access `object` in the given mode.
    pub fn allowed(&self, state: &State, object: &str, mode: AccessMode) -> bool {
        self.perm_for(state, object)
            .is_some_and(|perms| mode.allowed_by(perms))
    }

    pub fn read_allowed(&self, state: &State, object: &str) -> bool {
        self.allowed(state, object, AccessMode::Read)
    }

    pub fn write_allowed(&self, state: &State, object: &str) -> bool {
        self.allowed(state, object, AccessMode::Write)
    }

    /// Whether a walk may enter `state` at all.
    pub(crate) fn enterable(&self, state: &State) -> bool {
        let (role, _) = state::effective_role(&self.tables, state);
        !self.blacklist.contains(role)
    }
}
