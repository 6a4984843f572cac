// crates/api-harness-core/src/template.rs
// ============================================================================
// Module: Request Templates and Response Expectations
// Description: Common outbound request shape and expected response outcomes.
// Purpose: Give every call site the same headers and status expectations.
// Dependencies: api-harness-config, serde, thiserror
// ============================================================================

//! ## Overview
//! [`RequestTemplate::build_common`] reads the current configuration and
//! produces an immutable template: JSON content and accept types, a client
//! identifier, the API key header and a bearer authorization header. The
//! bearer header is sent even when the configured token is empty, in which
//! case it reads `Bearer `.
//!
//! [`ResponseExpectation`] pairs an expected status with an optional JSON
//! content-type requirement. [`ResponseExpectation::matches`] is a pure
//! predicate over an [`ApiResponse`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use api_harness_config::ConfigStore;
use serde::Serialize;
use thiserror::Error;

use crate::response::ApiResponse;
use crate::response::is_json_media_type;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JSON media type used for both content and accept headers.
pub const JSON_MEDIA_TYPE: &str = "application/json";
/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Client identifier sent on every request.
pub const USER_AGENT: &str = concat!("api-harness/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// SECTION: Request Template
// ============================================================================

/// Immutable description of the common request shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestTemplate {
    /// Outbound content type.
    content_type: String,
    /// Accepted response type.
    accept: String,
    /// Header pairs in send order.
    headers: Vec<(String, String)>,
    /// Whether request and response exchanges are logged in full.
    logs_all: bool,
}

impl RequestTemplate {
    /// Builds the common template from the current configuration.
    ///
    /// Reads `api.token` each time it is called; an absent token yields empty
    /// header values rather than an error.
    #[must_use]
    pub fn build_common(config: &ConfigStore) -> Self {
        let token = config.api_token();
        Self {
            content_type: JSON_MEDIA_TYPE.to_string(),
            accept: JSON_MEDIA_TYPE.to_string(),
            headers: vec![
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                (API_KEY_HEADER.to_string(), token.clone()),
                ("Authorization".to_string(), format!("Bearer {token}")),
            ],
            logs_all: true,
        }
    }

    /// Outbound content type.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Accepted response type.
    #[must_use]
    pub fn accept(&self) -> &str {
        &self.accept
    }

    /// Header pairs in send order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Looks up a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// True when exchanges made with this template are logged in full.
    #[must_use]
    pub const fn logs_all(&self) -> bool {
        self.logs_all
    }

    /// Returns a copy with `name` set to `value`, replacing any existing value.
    #[must_use]
    pub fn with_header(&self, name: &str, value: &str) -> Self {
        let mut next = self.clone();
        next.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        next.headers.push((name.to_string(), value.to_string()));
        next
    }

    /// Returns a copy with full exchange logging toggled.
    #[must_use]
    pub fn with_logging(&self, logs_all: bool) -> Self {
        let mut next = self.clone();
        next.logs_all = logs_all;
        next
    }

    /// Builds the expectation for a named outcome.
    #[must_use]
    pub const fn expectation(outcome: ExpectedOutcome) -> ResponseExpectation {
        ResponseExpectation::for_outcome(outcome)
    }
}

// ============================================================================
// SECTION: Expected Outcomes
// ============================================================================

/// Named response outcomes a test can expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    /// 200 with a JSON body.
    Success,
    /// 201 with a JSON body.
    Created,
    /// 204; no body check.
    Deleted,
    /// 404.
    NotFound,
    /// 400.
    BadRequest,
    /// 401.
    Unauthorized,
}

impl ExpectedOutcome {
    /// All outcomes, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Success,
        Self::Created,
        Self::Deleted,
        Self::NotFound,
        Self::BadRequest,
        Self::Unauthorized,
    ];

    /// Stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Created => "created",
            Self::Deleted => "deleted",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
        }
    }
}

impl fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpectedOutcome {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|outcome| outcome.as_str() == normalized).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|outcome| outcome.as_str()).collect();
            format!("unknown outcome `{value}` (expected one of: {})", known.join(", "))
        })
    }
}

// ============================================================================
// SECTION: Response Expectation
// ============================================================================

/// Expected status and body shape for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponseExpectation {
    /// Outcome this expectation was built from.
    pub outcome: ExpectedOutcome,
    /// Expected HTTP status.
    pub status: u16,
    /// Whether the response must declare a JSON content type.
    pub json_body: bool,
}

impl ResponseExpectation {
    /// Returns the expectation for a named outcome.
    #[must_use]
    pub const fn for_outcome(outcome: ExpectedOutcome) -> Self {
        let (status, json_body) = match outcome {
            ExpectedOutcome::Success => (200, true),
            ExpectedOutcome::Created => (201, true),
            ExpectedOutcome::Deleted => (204, false),
            ExpectedOutcome::NotFound => (404, false),
            ExpectedOutcome::BadRequest => (400, false),
            ExpectedOutcome::Unauthorized => (401, false),
        };
        Self {
            outcome,
            status,
            json_body,
        }
    }

    /// Returns true when `response` satisfies this expectation.
    #[must_use]
    pub fn matches(&self, response: &ApiResponse) -> bool {
        self.check(response).is_ok()
    }

    /// Checks `response`, describing the first mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationMismatch`] when the status or content type differ.
    pub fn check(&self, response: &ApiResponse) -> Result<(), ExpectationMismatch> {
        if response.status() != self.status {
            return Err(ExpectationMismatch::Status {
                outcome: self.outcome,
                expected: self.status,
                actual: response.status(),
            });
        }
        if self.json_body && !response.content_type().is_some_and(is_json_media_type) {
            return Err(ExpectationMismatch::ContentType {
                outcome: self.outcome,
                actual: response.content_type().unwrap_or("<none>").to_string(),
            });
        }
        Ok(())
    }
}

/// Reason a response did not meet its expectation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpectationMismatch {
    /// Status code differs.
    #[error("{outcome}: expected status {expected}, got {actual}")]
    Status {
        /// Expected outcome.
        outcome: ExpectedOutcome,
        /// Expected status.
        expected: u16,
        /// Received status.
        actual: u16,
    },
    /// Body was required to be JSON but is not.
    #[error("{outcome}: expected content type application/json, got {actual}")]
    ContentType {
        /// Expected outcome.
        outcome: ExpectedOutcome,
        /// Received content type.
        actual: String,
    },
}
