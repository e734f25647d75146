//! # Gran Policy
//!
//! `gran_policy` turns a grsecurity-style RBAC policy on disk into the
//! permission tables the analysis engine runs on. The pipeline is:
//!
//! 1. **Preprocess** (`preprocess`): expand `include`/`define`/`replace`,
//!    strip comments and braces, disambiguate reserved words.
//! 2. **Parse** (`parser`): tokenise and fold the flat statement list
//!    into role declarations.
//! 3. **Expand** (`expand`): split each `domain` into one role per
//!    bound user.
//! 4. **Build** (`build`): materialise per-(role, subject, object)
//!    permissions, capability deltas, and transition sets.
//! 5. **Inherit** (`inherit`): close permissions and capabilities over
//!    longest-proper-prefix subject parents.

pub mod build;
pub mod expand;
pub mod grammar;
pub mod inherit;
pub mod parser;
pub mod preprocess;

use std::path::Path;

use gran_core::Result;

pub use build::{PolicyTables, RoleInfo};
pub use preprocess::preprocess;

/// Compile a policy file (or directory) into its permission tables.
pub fn compile(root: &Path) -> Result<PolicyTables> {
    let text = preprocess::preprocess(root)?;
    compile_text(&text)
}

/// Compile already-preprocessed policy text.
pub fn compile_text(text: &str) -> Result<PolicyTables> {
    let decls = parser::parse_policy(text)?;
    let decls = expand::expand_domains(decls);
    let mut tables = build::build_tables(&decls)?;
    inherit::apply_inheritance(&mut tables);
    Ok(tables)
}
