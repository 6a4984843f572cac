// crates/api-harness-core/src/template_tests.rs
// ============================================================================
// Module: Request Template Unit Tests
// Description: Header construction and response expectation predicates.
// Purpose: Pin the common header set and outcome table.
// Dependencies: api-harness-config
// ============================================================================

//! ## Overview
//! Unit coverage for request templates and response expectations.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::time::Duration;

use api_harness_config::ConfigOverrides;
use api_harness_config::ConfigStore;
use api_harness_config::keys;
use serde_json::json;

use crate::response::ApiResponse;
use crate::template::ExpectationMismatch;
use crate::template::ExpectedOutcome;
use crate::template::RequestTemplate;
use crate::template::USER_AGENT;

fn store_with_token(token: Option<&str>) -> ConfigStore {
    let mut values = vec![(keys::BASE_URL, "https://svc"), (keys::USERS_ENDPOINT, "/users")];
    if let Some(token) = token {
        values.push((keys::API_TOKEN, token));
    }
    ConfigStore::from_values(values, ConfigOverrides::none())
}

#[test]
fn common_template_carries_token_headers() {
    let template = RequestTemplate::build_common(&store_with_token(Some("abc123")));
    assert_eq!(template.content_type(), "application/json");
    assert_eq!(template.accept(), "application/json");
    assert_eq!(template.header("x-api-key"), Some("abc123"));
    assert_eq!(template.header("authorization"), Some("Bearer abc123"));
    assert_eq!(template.header("user-agent"), Some(USER_AGENT));
    assert!(template.logs_all());
}

#[test]
fn empty_token_still_sends_bearer_prefix() {
    let template = RequestTemplate::build_common(&store_with_token(None));
    assert_eq!(template.header("Authorization"), Some("Bearer "));
    assert_eq!(template.header("x-api-key"), Some(""));
}

#[test]
fn template_reflects_token_override_on_rebuild() {
    let overrides = ConfigOverrides::from_pairs([(keys::API_TOKEN, "override")]).unwrap();
    let store = ConfigStore::from_values([(keys::API_TOKEN, "file")], overrides);
    let template = RequestTemplate::build_common(&store);
    assert_eq!(template.header("authorization"), Some("Bearer override"));
}

#[test]
fn with_header_replaces_case_insensitively() {
    let template = RequestTemplate::build_common(&store_with_token(Some("t")));
    let next = template.with_header("X-API-KEY", "other");
    assert_eq!(next.header("x-api-key"), Some("other"));
    assert_eq!(next.headers().len(), template.headers().len());
    assert_eq!(template.header("x-api-key"), Some("t"));
}

#[test]
fn expectation_table_matches_outcomes() {
    let statuses: Vec<u16> = ExpectedOutcome::ALL
        .iter()
        .map(|outcome| RequestTemplate::expectation(*outcome).status)
        .collect();
    assert_eq!(statuses, vec![200, 201, 204, 404, 400, 401]);
}

#[test]
fn success_requires_json_content_type() {
    let expectation = RequestTemplate::expectation(ExpectedOutcome::Success);
    let json = ApiResponse::json(200, &json!({"data": {}}), Duration::ZERO);
    assert!(expectation.matches(&json));
    let html = ApiResponse::new(200, [("content-type", "text/html")], Vec::new(), Duration::ZERO);
    assert!(matches!(expectation.check(&html), Err(ExpectationMismatch::ContentType { .. })));
}

#[test]
fn deleted_ignores_body_and_type() {
    let expectation = RequestTemplate::expectation(ExpectedOutcome::Deleted);
    let response = ApiResponse::new(204, Vec::<(String, String)>::new(), Vec::new(), Duration::ZERO);
    assert!(expectation.matches(&response));
    let wrong = ApiResponse::new(200, Vec::<(String, String)>::new(), Vec::new(), Duration::ZERO);
    assert_eq!(
        expectation.check(&wrong).unwrap_err(),
        ExpectationMismatch::Status {
            outcome: ExpectedOutcome::Deleted,
            expected: 204,
            actual: 200,
        }
    );
}

#[test]
fn outcome_names_parse() {
    assert_eq!("not-found".parse::<ExpectedOutcome>().unwrap(), ExpectedOutcome::NotFound);
    assert_eq!("Created".parse::<ExpectedOutcome>().unwrap(), ExpectedOutcome::Created);
    assert!("teapot".parse::<ExpectedOutcome>().is_err());
}
