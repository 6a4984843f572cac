// crates/api-harness-core/src/response.rs
// ============================================================================
// Module: API Response Shape
// Description: The response view the harness consumes from its transport.
// Purpose: Decouple checks and expectations from the HTTP client in use.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`ApiResponse`] is the only thing the orchestration core needs from an HTTP
//! exchange: status code, headers, raw body bytes, and elapsed time. Header
//! names are stored lowercase so lookups are case-insensitive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;
use std::time::Duration;

use serde_json::Value;

// ============================================================================
// SECTION: Response
// ============================================================================

/// A completed HTTP exchange as seen by the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    status: u16,
    /// Header pairs with lowercase names, in received order.
    headers: Vec<(String, String)>,
    /// Raw body bytes.
    body: Vec<u8>,
    /// Time from send to the last body byte.
    elapsed: Duration,
}

impl ApiResponse {
    /// Creates a response view; header names are lowercased.
    #[must_use]
    pub fn new<I, K, V>(status: u16, headers: I, body: Vec<u8>, elapsed: Duration) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            status,
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
                .collect(),
            body,
            elapsed,
        }
    }

    /// Creates a JSON response with the given status and body.
    #[must_use]
    pub fn json(status: u16, body: &Value, elapsed: Duration) -> Self {
        Self::new(
            status,
            [("content-type", "application/json")],
            body.to_string().into_bytes(),
            elapsed,
        )
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// All header pairs.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of the named header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `content-type` header, if present.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// True when the content type is JSON (`application/json` or `+json`).
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type().is_some_and(is_json_media_type)
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, lossily.
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when the body is not valid JSON.
    pub fn json_body(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Elapsed time of the exchange.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when a content-type value names a JSON media type.
#[must_use]
pub fn is_json_media_type(value: &str) -> bool {
    let media = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    media == "application/json" || media.ends_with("+json")
}

// ============================================================================
// SECTION: Tests
// ============================================================================
