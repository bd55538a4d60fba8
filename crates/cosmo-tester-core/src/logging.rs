// crates/cosmo-tester-core/src/logging.rs
// ============================================================================
// Module: Logging
// Description: Process-wide tracing subscriber installation.
// Purpose: Give the CLI binary and live suites one logging setup.
// Dependencies: tracing-subscriber
// ============================================================================

//! ## Overview
//! Installs a formatted `tracing` subscriber filtered by `RUST_LOG`, falling
//! back to the supplied directive. Installation happens at most once per
//! process; later calls leave the first subscriber in place.

use tracing_subscriber::EnvFilter;

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the global subscriber. Returns `false` when one was already set.
pub fn init_logging(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
