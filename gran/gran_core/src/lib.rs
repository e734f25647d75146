//! # Gran Core
//!
//! `gran_core` provides the shared data model for the gran RBAC policy
//! analyser: the parsed policy AST, the RBAC state tuple, transition
//! labels, capability tracking, and the path-matching primitives that
//! every later stage is built on.
//!
//! Key concepts:
//!
//! 1. **Role**: a named policy actor of exactly one kind (special,
//!    user, group, or default).
//!
//! 2. **Subject**: a filesystem path declared inside a role, carrying
//!    mode flags, transition policies, capability deltas, and objects.
//!
//! 3. **State**: a `(special, user, group, subject)` tuple describing
//!    which roles are active and which subject is executing.
//!
//! 4. **Greatest matching path**: the longest declared path that
//!    prefix-matches a concrete path under per-component globbing.

pub mod error;
pub mod path;
pub mod types;

pub use error::{Error, ParseError, Result, SemanticError};
pub use path::{components, gmp, pathmatch, GlobPath, PathSet};
pub use types::{
    cap_compute, AccessMode, CapDelta, CapTarget, Capability, Label, ObjectDecl, RoleDecl,
    RoleHead, RoleKind, State, SubjectDecl, TransPolicy, DONTCARE,
};
