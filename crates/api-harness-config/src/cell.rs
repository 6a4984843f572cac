// crates/api-harness-config/src/cell.rs
// ============================================================================
// Module: Config Initialization Cell
// Description: One-time, race-free loading of the shared config store.
// Purpose: Load the config file on first access and share the result.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`ConfigCell`] is the single designated initialization point for the
//! shared [`ConfigStore`]. The first caller of [`ConfigCell::get`] performs the
//! load; concurrent first callers block until it completes and then observe
//! the same store. A failed load is recorded too, so every caller sees the
//! same fatal [`ConfigError`]. After initialization reads take no lock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::OnceLock;

use crate::config::ConfigError;
use crate::config::ConfigStore;
use crate::overrides::ConfigOverrides;

// ============================================================================
// SECTION: Cell
// ============================================================================

/// Lazily loaded, process-scoped configuration.
#[derive(Debug)]
pub struct ConfigCell {
    /// Explicit config path; `None` defers to env/default resolution.
    path: Option<PathBuf>,
    /// Overrides attached to the store when it is loaded.
    overrides: ConfigOverrides,
    /// Load outcome, written exactly once.
    slot: OnceLock<Result<Arc<ConfigStore>, ConfigError>>,
}

impl ConfigCell {
    /// Creates an uninitialized cell.
    #[must_use]
    pub const fn new(path: Option<PathBuf>, overrides: ConfigOverrides) -> Self {
        Self {
            path,
            overrides,
            slot: OnceLock::new(),
        }
    }

    /// Creates a cell that is already initialized with `store`.
    #[must_use]
    pub fn with_store(store: ConfigStore) -> Self {
        let slot = OnceLock::new();
        let _ = slot.set(Ok(Arc::new(store)));
        Self {
            path: None,
            overrides: ConfigOverrides::none(),
            slot,
        }
    }

    /// Returns the shared store, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] recorded by the first load attempt.
    pub fn get(&self) -> Result<Arc<ConfigStore>, ConfigError> {
        self.slot
            .get_or_init(|| {
                ConfigStore::load(self.path.as_deref(), self.overrides.clone()).map(Arc::new)
            })
            .clone()
    }

    /// Returns true once a load has been attempted.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Returns the explicit path this cell loads from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
