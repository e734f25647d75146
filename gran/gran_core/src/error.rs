//! Error types for the gran analyser.
//!
//! This module defines the error hierarchy shared by the policy
//! compiler and the analysis engine.

use std::path::PathBuf;

use thiserror::Error;

/// Root error type for the gran system.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Semantic error: {0}")]
    Semantic(#[from] SemanticError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while preprocessing and parsing a policy.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("include cycle through {}", .0.display())]
    IncludeCycle(PathBuf),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("role {role} declares {count} kind flags, expected exactly one")]
    RoleKind { role: String, count: usize },

    #[error("{stmt} outside of a {scope} declaration")]
    Misplaced { stmt: String, scope: String },
}

/// Errors raised while interpreting a well-formed policy.
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("subject {subject} matches no subject path of role {role}")]
    NoSubjectMatch { role: String, subject: String },
}

/// Result type used throughout the gran system.
pub type Result<T> = std::result::Result<T, Error>;
