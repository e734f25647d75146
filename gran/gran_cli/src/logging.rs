//! Diagnostic output setup.

use tracing_subscriber::EnvFilter;

/// Initialise the tracing subscriber. Diagnostics go to stderr so the
/// report on stdout stays machine-readable; `--debug` raises the
/// default filter, and `RUST_LOG` overrides it entirely.
pub fn init(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
