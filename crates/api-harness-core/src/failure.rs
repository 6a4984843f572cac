// crates/api-harness-core/src/failure.rs
// ============================================================================
// Module: Test Failures
// Description: Outcome errors returned by test bodies.
// Purpose: Carry a failure message and rendered trace to the notifier.
// Dependencies: api-harness-config, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Test bodies return `Result<(), TestError>`. [`TestError::Failed`] carries a
//! [`TestFailure`] (message plus trace text built from the error source chain
//! and a captured backtrace); [`TestError::Skipped`] carries a reason and is
//! never retried. Harness errors convert into failures with `?`.
//!
//! Traces never depend on `RUST_BACKTRACE`: every constructor records the
//! caller location and a forced backtrace, and panics carry the trace the
//! scoped panic hook recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::backtrace::Backtrace;
use std::backtrace::BacktraceStatus;
use std::error::Error;
use std::fmt;
use std::fmt::Write;
use std::panic::Location;

use api_harness_config::ConfigError;
use serde::Serialize;
use thiserror::Error;

use crate::assertions::AggregateAssertionError;
use crate::checks::SchemaError;
use crate::client::ClientError;

// ============================================================================
// SECTION: Failure
// ============================================================================

/// A test failure: message and rendered trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestFailure {
    /// Failure message.
    message: String,
    /// Location, source chain and backtrace text.
    trace: String,
}

impl TestFailure {
    /// Creates a failure traced to the caller.
    #[must_use]
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let mut trace = render_location(Location::caller());
        trace.push_str(&render_backtrace(&Backtrace::force_capture()));
        Self {
            message: message.into(),
            trace,
        }
    }

    /// Builds a failure from an error and its source chain.
    #[must_use]
    #[track_caller]
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut trace = render_location(Location::caller());
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(trace, "caused by: {cause}");
            source = cause.source();
        }
        trace.push_str(&render_backtrace(&Backtrace::force_capture()));
        Self {
            message: err.to_string(),
            trace,
        }
    }

    /// Builds a failure from a panic message and the trace recorded for it.
    #[must_use]
    pub fn from_panic(message: &str, trace: impl Into<String>) -> Self {
        Self {
            message: format!("test panicked: {message}"),
            trace: trace.into(),
        }
    }

    /// Appends soft-assertion failures to this failure's message.
    #[must_use]
    pub fn with_assertions(mut self, assertions: &AggregateAssertionError) -> Self {
        self.message = format!("{}\n{assertions}", self.message);
        self
    }

    /// Failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rendered trace text.
    #[must_use]
    pub fn trace(&self) -> &str {
        &self.trace
    }
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Renders the location a failure was raised from.
fn render_location(location: &Location<'_>) -> String {
    format!("at {}:{}:{}\n", location.file(), location.line(), location.column())
}

/// Renders a backtrace when the platform supports capturing one.
fn render_backtrace(backtrace: &Backtrace) -> String {
    if backtrace.status() == BacktraceStatus::Captured {
        format!("backtrace:\n{backtrace}")
    } else {
        String::new()
    }
}

// ============================================================================
// SECTION: Body Errors
// ============================================================================

/// Non-pass outcome of a test body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestError {
    /// The test failed.
    #[error("{0}")]
    Failed(TestFailure),
    /// The test chose not to run.
    #[error("skipped: {0}")]
    Skipped(String),
}

impl TestError {
    /// Failure with a plain message.
    #[must_use]
    #[track_caller]
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Failed(TestFailure::new(message))
    }

    /// Skip with a reason.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }
}

impl From<TestFailure> for TestError {
    fn from(failure: TestFailure) -> Self {
        Self::Failed(failure)
    }
}

impl From<ConfigError> for TestError {
    #[track_caller]
    fn from(err: ConfigError) -> Self {
        Self::Failed(TestFailure::from_error(&err))
    }
}

impl From<ClientError> for TestError {
    #[track_caller]
    fn from(err: ClientError) -> Self {
        Self::Failed(TestFailure::from_error(&err))
    }
}

impl From<AggregateAssertionError> for TestError {
    #[track_caller]
    fn from(err: AggregateAssertionError) -> Self {
        Self::Failed(TestFailure::from_error(&err))
    }
}

impl From<SchemaError> for TestError {
    #[track_caller]
    fn from(err: SchemaError) -> Self {
        Self::Failed(TestFailure::from_error(&err))
    }
}

impl From<serde_json::Error> for TestError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        Self::Failed(TestFailure::from_error(&err))
    }
}
