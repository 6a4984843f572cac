// crates/api-harness-config/src/overrides.rs
// ============================================================================
// Module: Process-Level Config Overrides
// Description: Override values captured once at process start.
// Purpose: Let any config key be replaced from the environment or CLI flags.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Overrides are captured into an immutable map when the process starts and
//! take precedence over file values. Keys are normalized so that
//! `API_HARNESS__API_BASE_URL` and `api.base.url` name the same setting:
//! lowercase, with `_` and `.` treated as the same separator. Environment
//! values are parsed with strict UTF-8 enforcement; invalid input fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::ffi::OsString;

use crate::config::ConfigError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix marking an environment variable as a config override.
pub const OVERRIDE_ENV_PREFIX: &str = "API_HARNESS__";

// ============================================================================
// SECTION: Overrides
// ============================================================================

/// Process-level override values keyed by normalized dotted key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Normalized key to override value.
    values: BTreeMap<String, String>,
}

impl ConfigOverrides {
    /// Returns an empty override set.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Captures overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] when a prefixed variable holds
    /// invalid UTF-8 or names no key.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_vars(std::env::vars_os())
    }

    /// Captures overrides from an explicit environment listing.
    ///
    /// Variables without the `API_HARNESS__` prefix are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] when a prefixed variable holds
    /// invalid UTF-8 or names no key.
    pub fn from_env_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut values = BTreeMap::new();
        for (name, value) in vars {
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(raw_key) = name.strip_prefix(OVERRIDE_ENV_PREFIX) else {
                continue;
            };
            let key = normalize_key(raw_key)?;
            let value = value
                .into_string()
                .map_err(|_| ConfigError::Override(format!("{name} must be valid UTF-8")))?;
            values.insert(key, value);
        }
        Ok(Self {
            values,
        })
    }

    /// Builds overrides from `key=value` assignments (as given to `--set`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] when an assignment has no `=` or an
    /// empty key.
    pub fn from_assignments<I, S>(assignments: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = Self::default();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let Some((key, value)) = assignment.split_once('=') else {
                return Err(ConfigError::Override(format!(
                    "override '{assignment}' must have the form key=value"
                )));
            };
            overrides.values.insert(normalize_key(key)?, value.to_string());
        }
        Ok(overrides)
    }

    /// Builds overrides from key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] when a key is empty.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut overrides = Self::default();
        for (key, value) in pairs {
            overrides.values.insert(normalize_key(key.as_ref())?, value.into());
        }
        Ok(overrides)
    }

    /// Layers `other` on top of `self`; keys in `other` win.
    #[must_use]
    pub fn merged_with(mut self, other: Self) -> Self {
        self.values.extend(other.values);
        self
    }

    /// Returns the override for a key, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&fold_key(key)).map(String::as_str)
    }

    /// Iterates the normalized override keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns the number of overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no overrides were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Normalizes an override key, rejecting empty names.
fn normalize_key(raw: &str) -> Result<String, ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::Override("override key must not be empty".to_string()));
    }
    Ok(fold_key(raw))
}

/// Canonical key form shared by every layer: trimmed, lowercase, `_` folded to `.`.
pub(crate) fn fold_key(raw: &str) -> String {
    raw.trim().chars().map(|ch| if ch == '_' { '.' } else { ch.to_ascii_lowercase() }).collect()
}
