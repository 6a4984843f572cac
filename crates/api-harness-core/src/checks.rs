// crates/api-harness-core/src/checks.rs
// ============================================================================
// Module: Response Checks
// Description: Reusable response validations that feed an aggregator.
// Purpose: Express common status, timing, field, and schema checks once.
// Dependencies: jsonschema, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! Every check records its outcome into an [`AssertionAggregator`] and
//! returns whether it passed, so a test body can keep going after a failure
//! and report everything at flush time.
//!
//! Field paths are dotted (`data.id`, `data.0.email`) and are resolved as
//! JSON pointers. A field passes when it is present and not `null`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing::info;

use crate::assertions::AssertionAggregator;
use crate::response::ApiResponse;
use crate::template::ResponseExpectation;

// ============================================================================
// SECTION: Schema Validation
// ============================================================================

/// Errors loading or compiling a JSON schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Schema file could not be read.
    #[error("failed to read schema {path}: {message}")]
    Io {
        /// Schema path.
        path: PathBuf,
        /// I/O message.
        message: String,
    },
    /// Schema file is not valid JSON.
    #[error("schema {path} is not valid json: {message}")]
    Parse {
        /// Schema path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
    /// Schema document did not compile.
    #[error("schema {name} failed to compile: {message}")]
    Compile {
        /// Schema name or path.
        name: String,
        /// Compiler message.
        message: String,
    },
}

/// Validates JSON documents against a schema.
pub trait SchemaValidator {
    /// Human-readable schema name for failure descriptions.
    fn name(&self) -> &str;

    /// Returns every violation message; empty means valid.
    fn validate(&self, instance: &Value) -> Vec<String>;
}

/// Schema compiled from a JSON document with the `jsonschema` crate.
pub struct JsonSchemaFile {
    /// Schema name (file path or caller label).
    name: String,
    /// Compiled validator.
    validator: Validator,
}

impl std::fmt::Debug for JsonSchemaFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaFile").field("name", &self.name).finish_non_exhaustive()
    }
}

impl JsonSchemaFile {
    /// Loads and compiles a schema file.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when the file cannot be read, parsed, or compiled.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let text = fs::read_to_string(path).map_err(|err| SchemaError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let schema: Value = serde_json::from_str(&text).map_err(|err| SchemaError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_value(path.display().to_string(), &schema)
    }

    /// Compiles an in-memory schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Compile`] when the schema is invalid.
    pub fn from_value(name: impl Into<String>, schema: &Value) -> Result<Self, SchemaError> {
        let name = name.into();
        let validator =
            jsonschema::options().build(schema).map_err(|err| SchemaError::Compile {
                name: name.clone(),
                message: err.to_string(),
            })?;
        Ok(Self {
            name,
            validator,
        })
    }
}

impl SchemaValidator for JsonSchemaFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, instance: &Value) -> Vec<String> {
        self.validator.iter_errors(instance).map(|err| err.to_string()).collect()
    }
}

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Records whether the response status equals `expected`.
pub fn check_status(
    aggregator: &mut AssertionAggregator,
    response: &ApiResponse,
    expected: u16,
) -> bool {
    debug!(expected, actual = response.status(), "validating status code");
    aggregator.check_eq("status code", expected, response.status())
}

/// Records whether the response arrived strictly within `max`.
pub fn check_response_time(
    aggregator: &mut AssertionAggregator,
    response: &ApiResponse,
    max: Duration,
) -> bool {
    let elapsed = response.elapsed();
    aggregator.record(
        "response time",
        format!("< {} ms", max.as_millis()),
        format!("{} ms", elapsed.as_millis()),
        elapsed < max,
    )
}

/// Records, per path, whether the JSON body holds a non-null value there.
pub fn check_fields(
    aggregator: &mut AssertionAggregator,
    response: &ApiResponse,
    paths: &[&str],
) -> bool {
    let body = match response.json_body() {
        Ok(body) => body,
        Err(err) => {
            let actual = err.to_string();
            return aggregator.record("response body is json", "json document", actual, false);
        }
    };
    let mut all_present = true;
    for path in paths {
        let value = body.pointer(&field_pointer(path));
        let present = value.is_some_and(|value| !value.is_null());
        let actual = value.map_or_else(|| "missing".to_string(), Value::to_string);
        let description = format!("{path} not null");
        all_present &= aggregator.record(description, "non-null value", actual, present);
    }
    all_present
}

/// Records basic sanity: positive status and a UTF-8 readable body.
pub fn check_basic(aggregator: &mut AssertionAggregator, response: &ApiResponse) -> bool {
    let status_ok = aggregator.record(
        "status code greater than 0",
        "> 0",
        response.status().to_string(),
        response.status() > 0,
    );
    let readable = std::str::from_utf8(response.body()).is_ok();
    let actual = if readable { "utf-8 text" } else { "binary" };
    let body_ok = aggregator.record("response body readable", "utf-8 text", actual, readable);
    status_ok && body_ok
}

/// Records whether the response meets `expectation`.
pub fn check_expectation(
    aggregator: &mut AssertionAggregator,
    response: &ApiResponse,
    expectation: &ResponseExpectation,
) -> bool {
    match expectation.check(response) {
        Ok(()) => true,
        Err(mismatch) => aggregator.record(
            format!("response matches {}", expectation.outcome),
            format!("status {}", expectation.status),
            mismatch.to_string(),
            false,
        ),
    }
}

/// Records whether the JSON body satisfies `validator`.
pub fn check_schema(
    aggregator: &mut AssertionAggregator,
    response: &ApiResponse,
    validator: &dyn SchemaValidator,
) -> bool {
    let description = format!("body matches schema {}", validator.name());
    let body = match response.json_body() {
        Ok(body) => body,
        Err(err) => return aggregator.record(description, "json document", err.to_string(), false),
    };
    let violations = validator.validate(&body);
    let passed = violations.is_empty();
    if passed {
        info!(schema = validator.name(), "json schema validation passed");
    }
    aggregator.record(description, "no violations", violations.join("; "), passed)
}

/// Records whether the body is empty or whitespace only.
pub fn check_empty_body(aggregator: &mut AssertionAggregator, response: &ApiResponse) -> bool {
    let text = response.body_text();
    let empty = text.trim().is_empty();
    aggregator.record("response body empty", "empty body", text.into_owned(), empty)
}

/// Logs status, timing, headers, and body at info level.
pub fn log_response_details(response: &ApiResponse) {
    info!(
        status = response.status(),
        elapsed_ms = u64::try_from(response.elapsed().as_millis()).unwrap_or(u64::MAX),
        headers = ?response.headers(),
        body = %response.body_text(),
        "response details"
    );
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a dotted field path to a JSON pointer.
///
/// ```
/// use api_harness_core::checks::field_pointer;
///
/// assert_eq!(field_pointer("data.0.email"), "/data/0/email");
/// assert_eq!(field_pointer("a~b.c/d"), "/a~0b/c~1d");
/// ```
#[must_use]
pub fn field_pointer(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    path.split('.')
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}
