// crates/api-harness-core/src/assertions.rs
// ============================================================================
// Module: Assertion Aggregator
// Description: Deferred multi-assertion failure collection.
// Purpose: Report every failed check of a test at once.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! An [`AssertionAggregator`] records failed checks in order instead of
//! aborting on the first one. [`AssertionAggregator::flush_all`] raises one
//! [`AggregateAssertionError`] listing them all and always leaves the list
//! empty.
//!
//! [`SoftAssertions::run`] scopes an aggregator around a test body and flushes
//! it on every exit path: normal return, early error return, and panic.
//! Dropping an aggregator that still holds failures is a harness bug and
//! panics.
//!
//! Panics inside a scope are recorded with their location and a backtrace by
//! a process-wide panic hook, installed once and chained to the previous hook.
//! The hook only records on threads currently inside [`SoftAssertions::run`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::Cell;
use std::cell::RefCell;
use std::fmt;
use std::fmt::Debug;
use std::mem;
use std::panic;
use std::panic::AssertUnwindSafe;
use std::panic::PanicHookInfo;
use std::panic::catch_unwind;
use std::sync::Once;
use std::thread;

use serde::Serialize;
use thiserror::Error;
use tracing::error;

// ============================================================================
// SECTION: Failures
// ============================================================================

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionFailure {
    /// What was being checked.
    pub description: String,
    /// Expected value, rendered.
    pub expected: String,
    /// Observed value, rendered.
    pub actual: String,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: expected {}, got {}", self.description, self.expected, self.actual)
    }
}

/// Every failure recorded before a flush.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_failures(.failures))]
pub struct AggregateAssertionError {
    /// Failures in record order; never empty.
    pub failures: Vec<AssertionFailure>,
}

impl AggregateAssertionError {
    /// Number of failures carried.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Always false for errors produced by a flush.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Renders failures as a numbered list under a count header.
fn render_failures(failures: &[AssertionFailure]) -> String {
    let mut out = format!("{} assertion(s) failed:", failures.len());
    for (index, failure) in failures.iter().enumerate() {
        out.push_str(&format!("\n  {}. {failure}", index + 1));
    }
    out
}

// ============================================================================
// SECTION: Aggregator
// ============================================================================

/// Ordered collection of failed checks for one test attempt.
///
/// Call [`Self::flush_all`] before dropping, or let [`SoftAssertions::run`]
/// own the aggregator; dropping unflushed failures panics.
#[derive(Debug, Default)]
pub struct AssertionAggregator {
    /// Failures not yet flushed.
    failures: Vec<AssertionFailure>,
}

impl AssertionAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a check outcome; only failures are kept.
    pub fn record(
        &mut self,
        description: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        passed: bool,
    ) -> bool {
        if !passed {
            self.failures.push(AssertionFailure {
                description: description.into(),
                expected: expected.into(),
                actual: actual.into(),
            });
        }
        passed
    }

    /// Records whether `expected == actual`.
    #[allow(clippy::use_debug, reason = "Debug rendering is the portable form for any T.")]
    pub fn check_eq<T>(&mut self, description: impl Into<String>, expected: T, actual: T) -> bool
    where
        T: PartialEq + Debug,
    {
        let passed = expected == actual;
        self.record(description, format!("{expected:?}"), format!("{actual:?}"), passed)
    }

    /// Records whether `condition` holds.
    pub fn check_true(&mut self, description: impl Into<String>, condition: bool) -> bool {
        self.record(description, "true", condition.to_string(), condition)
    }

    /// Failures recorded since the last flush.
    #[must_use]
    pub fn failures(&self) -> &[AssertionFailure] {
        &self.failures
    }

    /// True when nothing has failed since the last flush.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Raises every recorded failure at once and clears the list.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateAssertionError`] when at least one check failed.
    pub fn flush_all(&mut self) -> Result<(), AggregateAssertionError> {
        let failures = mem::take(&mut self.failures);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateAssertionError {
                failures,
            })
        }
    }
}

impl Drop for AssertionAggregator {
    #[allow(
        clippy::panic,
        reason = "Unflushed failures must surface as a test failure."
    )]
    fn drop(&mut self) {
        if self.failures.is_empty() {
            return;
        }
        let message = render_failures(&self.failures);
        error!(failures = self.failures.len(), "assertion aggregator dropped without flush");
        if !thread::panicking() {
            panic!("assertion aggregator dropped without flush: {message}");
        }
    }
}

// ============================================================================
// SECTION: Scoped Soft Assertions
// ============================================================================

/// How a scoped body exited.
#[derive(Debug)]
pub enum ScopeExit<T, E> {
    /// Body returned normally.
    Returned(Result<T, E>),
    /// Body panicked.
    Panicked {
        /// Rendered panic payload.
        message: String,
        /// Panic location and backtrace; empty if the hook did not run.
        trace: String,
    },
}

/// Result of a scoped body together with its flushed assertions.
#[derive(Debug)]
pub struct ScopedOutcome<T, E> {
    /// How the body exited.
    pub exit: ScopeExit<T, E>,
    /// Result of flushing the scope's aggregator.
    pub flushed: Result<(), AggregateAssertionError>,
}

/// Runs bodies with a scoped aggregator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftAssertions;

impl SoftAssertions {
    /// Runs `body` with a fresh aggregator and flushes it on every exit path.
    pub fn run<T, E, F>(body: F) -> ScopedOutcome<T, E>
    where
        F: FnOnce(&mut AssertionAggregator) -> Result<T, E>,
    {
        install_panic_recorder();
        let mut aggregator = AssertionAggregator::new();
        LAST_PANIC_TRACE.with(|slot| slot.borrow_mut().clear());
        let was_recording = RECORDING_PANICS.with(|flag| flag.replace(true));
        let result = catch_unwind(AssertUnwindSafe(|| body(&mut aggregator)));
        RECORDING_PANICS.with(|flag| flag.set(was_recording));
        let exit = match result {
            Ok(result) => ScopeExit::Returned(result),
            Err(payload) => ScopeExit::Panicked {
                message: panic_message(payload.as_ref()),
                trace: LAST_PANIC_TRACE.with(RefCell::take),
            },
        };
        let flushed = aggregator.flush_all();
        ScopedOutcome {
            exit,
            flushed,
        }
    }
}

/// Renders a panic payload as text.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

// ============================================================================
// SECTION: Panic Recording
// ============================================================================

thread_local! {
    /// True while this thread runs a scoped body.
    static RECORDING_PANICS: Cell<bool> = const { Cell::new(false) };
    /// Trace of the most recent recorded panic on this thread.
    static LAST_PANIC_TRACE: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Guards the one-time hook installation.
static PANIC_RECORDER: Once = Once::new();

/// Chains a recording hook in front of the current panic hook.
fn install_panic_recorder() {
    PANIC_RECORDER.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if RECORDING_PANICS.with(Cell::get) {
                let trace = render_panic_trace(info);
                LAST_PANIC_TRACE.with(|slot| *slot.borrow_mut() = trace);
            }
            previous(info);
        }));
    });
}

/// Renders the panic location followed by a forced backtrace.
fn render_panic_trace(info: &PanicHookInfo<'_>) -> String {
    let location = info.location().map_or_else(
        || "panicked at an unknown location".to_string(),
        |location| format!("panicked at {}:{}:{}", location.file(), location.line(), location.column()),
    );
    format!("{location}\nbacktrace:\n{}", Backtrace::force_capture())
}
