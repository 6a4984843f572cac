// crates/api-harness-config/src/config_tests.rs
// ============================================================================
// Module: Config Store Unit Tests
// Description: Unit coverage for layered resolution and typed accessors.
// Purpose: Ensure precedence, defaults, and parse failures behave as documented.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Unit coverage for layered resolution and typed accessors.
//! Invariants:
//! - Overrides beat file values, file values beat defaults.
//! - Missing required keys error; optional keys fall back.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::ffi::OsString;
use std::time::Duration;

use super::ConfigError;
use super::ConfigOverrides;
use super::ConfigSource;
use super::ConfigStore;
use super::keys;

const SAMPLE: &str = r#"
environment = "staging"

[api]
base.url = "https://reqres.example"
users.endpoint = "/api/users"

[retry]
count = 2
interval = 250

[request]
timeout = "soon"
"#;

fn sample_store(overrides: ConfigOverrides) -> ConfigStore {
    ConfigStore::from_toml_str(SAMPLE, overrides).expect("sample config parses")
}

#[test]
fn nested_tables_flatten_to_dotted_keys() {
    let store = sample_store(ConfigOverrides::none());
    assert_eq!(store.base_url().unwrap(), "https://reqres.example");
    assert_eq!(store.users_endpoint().unwrap(), "/api/users");
    assert_eq!(store.get(keys::RETRY_COUNT).unwrap(), "2");
}

#[test]
fn override_beats_file_value() {
    let overrides =
        ConfigOverrides::from_pairs([("api.base.url", "http://127.0.0.1:9000")]).unwrap();
    let store = sample_store(overrides);
    let entry = store.entry(keys::BASE_URL).unwrap();
    assert_eq!(entry.value, "http://127.0.0.1:9000");
    assert_eq!(entry.source, ConfigSource::Override);
}

#[test]
fn env_overrides_normalize_key_names() {
    let vars = vec![
        (OsString::from("API_HARNESS__RETRY_COUNT"), OsString::from("5")),
        (OsString::from("UNRELATED"), OsString::from("ignored")),
    ];
    let overrides = ConfigOverrides::from_env_vars(vars).unwrap();
    assert_eq!(overrides.len(), 1);
    let store = sample_store(overrides);
    assert_eq!(store.retry_count(), 5);
}

#[test]
fn assignment_without_equals_is_rejected() {
    let err = ConfigOverrides::from_assignments(["api.token"]).unwrap_err();
    assert!(matches!(err, ConfigError::Override(_)));
}

#[test]
fn missing_required_key_is_an_error() {
    let store = ConfigStore::from_values(Vec::<(String, String)>::new(), ConfigOverrides::none());
    assert_eq!(
        store.base_url().unwrap_err(),
        ConfigError::Missing {
            key: keys::BASE_URL.to_string()
        }
    );
    assert_eq!(store.missing_required(), vec![keys::BASE_URL, keys::USERS_ENDPOINT]);
}

#[test]
fn api_token_defaults_to_empty() {
    let store = sample_store(ConfigOverrides::none());
    assert_eq!(store.api_token(), "");
}

#[test]
fn malformed_int_fails_strict_accessor() {
    let store = sample_store(ConfigOverrides::none());
    let err = store.get_int(keys::REQUEST_TIMEOUT).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Parse {
            key: keys::REQUEST_TIMEOUT.to_string(),
            raw: "soon".to_string(),
            expected: "integer",
        }
    );
}

#[test]
fn malformed_int_falls_back_with_default() {
    let store = sample_store(ConfigOverrides::none());
    assert_eq!(store.get_int_or_default(keys::REQUEST_TIMEOUT, 42), 42);
    assert_eq!(store.request_timeout(), Duration::from_millis(30_000));
}

#[test]
fn bool_accessors_accept_literals_and_reject_others() {
    let store = ConfigStore::from_values(
        [("feature.on", "TRUE"), ("feature.off", "0"), ("feature.odd", "maybe")],
        ConfigOverrides::none(),
    );
    assert!(store.get_bool("feature.on").unwrap());
    assert!(!store.get_bool("feature.off").unwrap());
    assert!(matches!(store.get_bool("feature.odd"), Err(ConfigError::Parse { .. })));
    assert!(store.get_bool_or_default("feature.odd", true));
    assert!(!store.get_bool_or_default("feature.absent", false));
}

#[test]
fn documented_defaults_apply() {
    let store = sample_store(ConfigOverrides::none());
    assert_eq!(store.connection_timeout(), Duration::from_millis(10_000));
    assert_eq!(store.retry_interval(), Duration::from_millis(250));
    assert_eq!(store.environment(), "staging");
    let empty = ConfigStore::default();
    assert_eq!(empty.environment(), "qa");
    assert_eq!(empty.retry_count(), 2);
    assert_eq!(empty.retry_interval(), Duration::from_millis(1_000));
}

#[test]
fn entries_report_sources() {
    let overrides = ConfigOverrides::from_pairs([("custom.flag", "on")]).unwrap();
    let store = sample_store(overrides);
    let entries = store.entries();
    let token = entries.iter().find(|entry| entry.key == keys::API_TOKEN).unwrap();
    assert_eq!(token.source, ConfigSource::Default);
    let retry = entries.iter().find(|entry| entry.key == keys::RETRY_COUNT).unwrap();
    assert_eq!(retry.source, ConfigSource::File);
    let custom = entries.iter().find(|entry| entry.key == "custom.flag").unwrap();
    assert_eq!(custom.source, ConfigSource::Override);
}

#[test]
fn arrays_are_rejected() {
    let err = ConfigStore::from_toml_str("hosts = [\"a\", \"b\"]", ConfigOverrides::none())
        .unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn file_and_override_keys_fold_to_one_entry() {
    let overrides = ConfigOverrides::from_pairs([("my.key", "override")]).unwrap();
    let store = ConfigStore::from_toml_str("my_key = \"file\"\nOther_Key = 3\n", overrides).unwrap();
    let matching: Vec<_> =
        store.entries().into_iter().filter(|entry| entry.key == "my.key").collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].source, ConfigSource::Override);
    assert_eq!(store.get("my_key").unwrap(), "override");
    assert_eq!(store.get_int("other.key").unwrap(), 3);
    assert!(store.entries().iter().all(|entry| !entry.key.contains('_')));
}
