// crates/api-harness-config/src/config.rs
// ============================================================================
// Module: API Harness Configuration Store
// Description: Layered key/value configuration backed by a TOML file.
// Purpose: Resolve named settings as override > file > default with typed access.
// Dependencies: serde, thiserror, toml, tracing
// ============================================================================

//! ## Overview
//! The config file is read once, flattened into dotted keys, and frozen into a
//! [`ConfigStore`]. Lookups consult captured process-level overrides first,
//! then file values. Required keys with no value fail with
//! [`ConfigError::Missing`]; typed accessors fail with [`ConfigError::Parse`]
//! on malformed input unless a default is supplied, in which case the error is
//! logged at warn level and the default is returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::overrides::ConfigOverrides;
use crate::overrides::fold_key;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "api-harness.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "API_HARNESS_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

/// Well-known configuration keys and their documented defaults.
pub mod keys {
    /// Base URL of the service under test (required).
    pub const BASE_URL: &str = "api.base.url";
    /// Path of the CRUD resource endpoint (required).
    pub const USERS_ENDPOINT: &str = "api.users.endpoint";
    /// API token used for the key and bearer headers (optional, empty default).
    pub const API_TOKEN: &str = "api.token";
    /// Per-request timeout in milliseconds.
    pub const REQUEST_TIMEOUT: &str = "request.timeout";
    /// Connection timeout in milliseconds.
    pub const CONNECTION_TIMEOUT: &str = "connection.timeout";
    /// Environment name reported in diagnostics.
    pub const ENVIRONMENT: &str = "environment";
    /// Number of retries for a failed test execution.
    pub const RETRY_COUNT: &str = "retry.count";
    /// Delay between retries in milliseconds.
    pub const RETRY_INTERVAL: &str = "retry.interval";

    /// Default request timeout in milliseconds.
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
    /// Default connection timeout in milliseconds.
    pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 10_000;
    /// Default environment name.
    pub const DEFAULT_ENVIRONMENT: &str = "qa";
    /// Default retry count.
    pub const DEFAULT_RETRY_COUNT: u32 = 2;
    /// Default retry interval in milliseconds.
    pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1_000;

    /// A documented key with its default, if any.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeySpec {
        /// Dotted key name.
        pub key: &'static str,
        /// Rendered default; `None` marks the key as required.
        pub default: Option<&'static str>,
    }

    /// Every documented key, in display order.
    pub const DOCUMENTED: [KeySpec; 8] = [
        KeySpec {
            key: BASE_URL,
            default: None,
        },
        KeySpec {
            key: USERS_ENDPOINT,
            default: None,
        },
        KeySpec {
            key: API_TOKEN,
            default: Some(""),
        },
        KeySpec {
            key: REQUEST_TIMEOUT,
            default: Some("30000"),
        },
        KeySpec {
            key: CONNECTION_TIMEOUT,
            default: Some("10000"),
        },
        KeySpec {
            key: ENVIRONMENT,
            default: Some(DEFAULT_ENVIRONMENT),
        },
        KeySpec {
            key: RETRY_COUNT,
            default: Some("2"),
        },
        KeySpec {
            key: RETRY_INTERVAL,
            default: Some("1000"),
        },
    ];
}

// ============================================================================
// SECTION: Entry Types
// ============================================================================

/// Layer a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Process-level override captured at start.
    Override,
    /// Value read from the config file.
    File,
    /// Caller-supplied or documented default.
    Default,
}

impl ConfigSource {
    /// Returns the stable label for this source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::File => "file",
            Self::Default => "default",
        }
    }
}

impl Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved configuration value and the layer that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigEntry {
    /// Dotted key name.
    pub key: String,
    /// Resolved value.
    pub value: String,
    /// Layer that supplied the value.
    pub source: ConfigSource,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The config file is missing, unreadable, or unparsable. Fatal.
    #[error("config load error: {0}")]
    Load(String),
    /// No value exists for a required key.
    #[error("config key '{key}' has no value")]
    Missing {
        /// Key that was looked up.
        key: String,
    },
    /// A value could not be parsed as the requested type.
    #[error("config key '{key}' has malformed value '{raw}' (expected {expected})")]
    Parse {
        /// Key that was looked up.
        key: String,
        /// Raw string value.
        raw: String,
        /// Human-readable expected type.
        expected: &'static str,
    },
    /// A process-level override is malformed.
    #[error("invalid config override: {0}")]
    Override(String),
}

// ============================================================================
// SECTION: Config Store
// ============================================================================

/// Immutable, layered configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    /// Path the file layer was loaded from, when file-backed.
    path: Option<PathBuf>,
    /// Flattened file values keyed by dotted name.
    file_values: BTreeMap<String, String>,
    /// Process-level overrides.
    overrides: ConfigOverrides,
}

impl ConfigStore {
    /// Loads the file layer from disk and attaches the given overrides.
    ///
    /// The path resolves from the argument, then `API_HARNESS_CONFIG`, then
    /// `api-harness.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when the file is missing, too large, not
    /// UTF-8, or not valid TOML.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path);
        let bytes = fs::read(&resolved).map_err(|err| {
            ConfigError::Load(format!("failed to read {}: {err}", resolved.display()))
        })?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Load("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Load("config file must be utf-8".to_string()))?;
        let mut store = Self::from_toml_str(content, overrides)?;
        info!(path = %resolved.display(), keys = store.file_values.len(), "configuration loaded");
        store.path = Some(resolved);
        Ok(store)
    }

    /// Builds a store from TOML text instead of a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when the text is not valid TOML or holds
    /// values that cannot be flattened to strings.
    pub fn from_toml_str(content: &str, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let table: toml::Table =
            content.parse().map_err(|err| ConfigError::Load(format!("config parse error: {err}")))?;
        let mut file_values = BTreeMap::new();
        flatten_table("", &table, &mut file_values)?;
        Ok(Self {
            path: None,
            file_values,
            overrides,
        })
    }

    /// Builds a store from already-flattened key/value pairs.
    #[must_use]
    pub fn from_values<I, K, V>(values: I, overrides: ConfigOverrides) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            path: None,
            file_values: values
                .into_iter()
                .map(|(key, value)| {
                    let key: String = key.into();
                    (fold_key(&key), value.into())
                })
                .collect(),
            overrides,
        }
    }

    /// Returns the file path backing this store, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the captured overrides.
    #[must_use]
    pub const fn overrides(&self) -> &ConfigOverrides {
        &self.overrides
    }

    /// Resolves a key against the override and file layers.
    ///
    /// Keys compare in folded form (see [`ConfigOverrides`]), so `retry_count`
    /// and `retry.count` name the same entry in both layers.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<ConfigEntry> {
        let key = fold_key(key);
        if let Some(value) = self.overrides.get(&key) {
            return Some(ConfigEntry {
                key: key.clone(),
                value: value.to_string(),
                source: ConfigSource::Override,
            });
        }
        self.file_values.get(&key).map(|value| ConfigEntry {
            key: key.clone(),
            value: value.clone(),
            source: ConfigSource::File,
        })
    }

    /// Returns the resolved value for a key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when neither layer has the key.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        self.entry(key).map(|entry| entry.value).ok_or_else(|| ConfigError::Missing {
            key: key.to_string(),
        })
    }

    /// Returns the resolved value, or `default` when the key is absent.
    #[must_use]
    pub fn get_or_default(&self, key: &str, default: &str) -> String {
        self.entry(key).map_or_else(|| default.to_string(), |entry| entry.value)
    }

    /// Returns the value parsed as a signed integer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] or [`ConfigError::Parse`].
    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        self.get_parsed(key, "integer")
    }

    /// Returns the value parsed as a signed integer, falling back to `default`.
    #[must_use]
    pub fn get_int_or_default(&self, key: &str, default: i64) -> i64 {
        self.parsed_or_default(key, default, "integer")
    }

    /// Returns the value parsed as an unsigned integer, falling back to `default`.
    #[must_use]
    pub fn get_u64_or_default(&self, key: &str, default: u64) -> u64 {
        self.parsed_or_default(key, default, "non-negative integer")
    }

    /// Returns the value parsed as a boolean (`true`/`false`/`1`/`0`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] or [`ConfigError::Parse`].
    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let raw = self.get(key)?;
        parse_bool(&raw).ok_or_else(|| ConfigError::Parse {
            key: key.to_string(),
            raw,
            expected: "boolean",
        })
    }

    /// Returns the value parsed as a boolean, falling back to `default`.
    #[must_use]
    pub fn get_bool_or_default(&self, key: &str, default: bool) -> bool {
        match self.get_bool(key) {
            Ok(value) => value,
            Err(err) => fallback(key, default, &err),
        }
    }

    // ------------------------------------------------------------------------
    // Named accessors
    // ------------------------------------------------------------------------

    /// Base URL of the service under test.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `api.base.url` is unset.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        self.get(keys::BASE_URL)
    }

    /// Path of the resource endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `api.users.endpoint` is unset.
    pub fn users_endpoint(&self) -> Result<String, ConfigError> {
        self.get(keys::USERS_ENDPOINT)
    }

    /// API token; empty when not configured.
    #[must_use]
    pub fn api_token(&self) -> String {
        self.get_or_default(keys::API_TOKEN, "")
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(
            self.get_u64_or_default(keys::REQUEST_TIMEOUT, keys::DEFAULT_REQUEST_TIMEOUT_MS),
        )
    }

    /// Connection timeout.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(
            self.get_u64_or_default(keys::CONNECTION_TIMEOUT, keys::DEFAULT_CONNECTION_TIMEOUT_MS),
        )
    }

    /// Environment name.
    #[must_use]
    pub fn environment(&self) -> String {
        self.get_or_default(keys::ENVIRONMENT, keys::DEFAULT_ENVIRONMENT)
    }

    /// Number of retries for a failed test execution.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.parsed_or_default(keys::RETRY_COUNT, keys::DEFAULT_RETRY_COUNT, "non-negative integer")
    }

    /// Delay between retries.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(
            self.get_u64_or_default(keys::RETRY_INTERVAL, keys::DEFAULT_RETRY_INTERVAL_MS),
        )
    }

    // ------------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------------

    /// Lists every resolvable key with its value and source.
    ///
    /// Documented keys come first, falling back to their defaults; required
    /// keys without a value are omitted (see [`ConfigStore::missing_required`]).
    #[must_use]
    pub fn entries(&self) -> Vec<ConfigEntry> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for spec in keys::DOCUMENTED {
            seen.insert(spec.key.to_string());
            if let Some(entry) = self.entry(spec.key) {
                out.push(entry);
            } else if let Some(default) = spec.default {
                out.push(ConfigEntry {
                    key: spec.key.to_string(),
                    value: default.to_string(),
                    source: ConfigSource::Default,
                });
            }
        }
        let extra: BTreeSet<&str> = self
            .file_values
            .keys()
            .map(String::as_str)
            .chain(self.overrides.keys())
            .filter(|key| !seen.contains(*key))
            .collect();
        for key in extra {
            if let Some(entry) = self.entry(key) {
                out.push(entry);
            }
        }
        out
    }

    /// Returns the documented required keys that have no value.
    #[must_use]
    pub fn missing_required(&self) -> Vec<&'static str> {
        keys::DOCUMENTED
            .iter()
            .filter(|spec| spec.default.is_none() && self.entry(spec.key).is_none())
            .map(|spec| spec.key)
            .collect()
    }

    // ------------------------------------------------------------------------
    // Parsing helpers
    // ------------------------------------------------------------------------

    /// Resolves and parses a value via [`FromStr`].
    fn get_parsed<T: FromStr>(&self, key: &str, expected: &'static str) -> Result<T, ConfigError> {
        let raw = self.get(key)?;
        raw.trim().parse().map_err(|_| ConfigError::Parse {
            key: key.to_string(),
            raw,
            expected,
        })
    }

    /// Resolves and parses a value, logging and falling back on failure.
    fn parsed_or_default<T>(&self, key: &str, default: T, expected: &'static str) -> T
    where
        T: FromStr + Display,
    {
        match self.get_parsed(key, expected) {
            Ok(value) => value,
            Err(err) => fallback(key, default, &err),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Logs why a default is being used and returns it.
fn fallback<T: Display>(key: &str, default: T, err: &ConfigError) -> T {
    match err {
        ConfigError::Missing {
            ..
        } => debug!(key, %default, "config key unset, using default"),
        _ => warn!(key, %default, error = %err, "using default value for config key"),
    }
    default
}

/// Parses the accepted boolean literals.
fn parse_bool(raw: &str) -> Option<bool> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        return Some(true);
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        return Some(false);
    }
    None
}

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    env::var_os(CONFIG_ENV_VAR).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME), PathBuf::from)
}

/// Flattens nested TOML tables into dotted keys with string values.
fn flatten_table(
    prefix: &str,
    table: &toml::Table,
    out: &mut BTreeMap<String, String>,
) -> Result<(), ConfigError> {
    for (name, value) in table {
        let key = if prefix.is_empty() { name.clone() } else { format!("{prefix}.{name}") };
        let rendered = match value {
            toml::Value::Table(nested) => {
                flatten_table(&key, nested, out)?;
                continue;
            }
            toml::Value::String(text) => text.clone(),
            toml::Value::Integer(number) => number.to_string(),
            toml::Value::Float(number) => number.to_string(),
            toml::Value::Boolean(flag) => flag.to_string(),
            toml::Value::Datetime(stamp) => stamp.to_string(),
            toml::Value::Array(_) => {
                return Err(ConfigError::Load(format!("config key '{key}' must be a scalar")));
            }
        };
        out.insert(fold_key(&key), rendered);
    }
    Ok(())
}
