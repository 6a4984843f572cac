// crates/api-harness-config/src/lib.rs
// ============================================================================
// Module: API Harness Config Library
// Description: Layered configuration resolution for the API harness.
// Purpose: Expose the config store, override capture, and one-time init cell.
// Dependencies: serde, thiserror, toml, tracing
// ============================================================================

//! ## Overview
//! Configuration values resolve in a fixed order: process-level overrides,
//! then values read from the TOML config file, then caller-supplied defaults.
//! The file is read once; the resulting [`ConfigStore`] is immutable and is
//! shared by reference across the harness.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cell;
pub mod config;
pub mod overrides;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod config_tests;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use cell::ConfigCell;
pub use config::ConfigEntry;
pub use config::ConfigError;
pub use config::ConfigSource;
pub use config::ConfigStore;
pub use config::keys;
pub use overrides::ConfigOverrides;
