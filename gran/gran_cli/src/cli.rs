use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Static information-flow analysis for grsecurity RBAC policies.
///
/// Compiles a policy into a transition system over RBAC states and
/// searches for direct, indirect, and write-execute flows reachable
/// from the configured entry points.
#[derive(Parser)]
#[command(name = "gran", version, disable_version_flag = true)]
pub struct Cli {
    /// Path to the root policy file or directory
    pub policy: PathBuf,

    /// Do not blacklist administrative roles
    #[arg(short = 'a', long = "admin")]
    pub admin: bool,

    /// Assume no set-UID/GID binaries; exec does not change UID/GID
    #[arg(short = 'b', long = "bestcase")]
    pub bestcase: bool,

    /// Entry-points file, one state (or state pair plus target) per line
    #[arg(short = 'e', long = "entrypoints", value_name = "FILE")]
    pub entrypoints: Option<PathBuf>,

    /// Targets file, one path per line
    #[arg(short = 't', long = "targets", value_name = "FILE")]
    pub targets: Option<PathBuf>,

    /// Extract targets from a learn-config file
    #[arg(short = 'l', long = "learnconfig", value_name = "FILE")]
    pub learnconfig: Option<PathBuf>,

    /// Dump the preprocessed policy
    #[arg(short = 'P', long = "processedpolicy", value_name = "FILE")]
    pub processedpolicy: Option<PathBuf>,

    /// Write the findings as JSON
    #[arg(short = 'j', long = "json", value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Enable verbose diagnostics
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Print version, exit 0
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,
}
