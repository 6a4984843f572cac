// crates/api-harness-core/src/telemetry.rs
// ============================================================================
// Module: Logging Setup
// Description: One-time tracing subscriber installation.
// Purpose: Route harness logs to stderr with an env-overridable filter.
// Dependencies: tracing-subscriber
// ============================================================================

//! ## Overview
//! Installs a `tracing` subscriber once per process. `RUST_LOG` wins when set;
//! otherwise the harness crates log at `level`. Output goes to stderr so
//! command output on stdout stays machine-readable.

use std::io;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Installs the global subscriber.
///
/// Returns `false` when a subscriber was already installed; the existing one
/// is kept.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,api_harness_core={level},api_harness_config={level},api_harness_cli={level}"
        ))
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .is_ok()
}
