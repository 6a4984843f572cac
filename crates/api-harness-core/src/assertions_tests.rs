// crates/api-harness-core/src/assertions_tests.rs
// ============================================================================
// Module: Assertion Aggregator Unit Tests
// Description: Recording, flushing, and scoped exit paths.
// Purpose: Ensure no recorded failure is lost or reported twice.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Unit coverage for deferred assertion collection and scoped flushing.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;

use crate::assertions::AssertionAggregator;
use crate::assertions::ScopeExit;
use crate::assertions::SoftAssertions;

#[test]
fn empty_flush_is_ok() {
    let mut aggregator = AssertionAggregator::new();
    assert!(aggregator.flush_all().is_ok());
    assert!(aggregator.flush_all().is_ok());
}

#[test]
fn passing_records_are_not_kept() {
    let mut aggregator = AssertionAggregator::new();
    assert!(aggregator.record("always", "x", "x", true));
    assert!(aggregator.check_eq("equal", 3, 3));
    assert!(aggregator.is_clean());
}

#[test]
fn flush_reports_every_failure_in_order_then_clears() {
    let mut aggregator = AssertionAggregator::new();
    aggregator.record("id not null", "non-null value", "null", false);
    aggregator.check_eq("status code", 200, 500);
    aggregator.check_true("page > 0", false);
    let err = aggregator.flush_all().unwrap_err();
    let descriptions: Vec<&str> =
        err.failures.iter().map(|failure| failure.description.as_str()).collect();
    assert_eq!(descriptions, vec!["id not null", "status code", "page > 0"]);
    let message = err.to_string();
    assert!(message.starts_with("3 assertion(s) failed:"));
    assert!(message.contains("status code: expected 200, got 500"));
    assert!(aggregator.flush_all().is_ok());
}

#[test]
fn dropping_unflushed_failures_panics() {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut aggregator = AssertionAggregator::new();
        aggregator.check_true("forgotten", false);
    }));
    assert!(result.is_err());
}

#[test]
fn flushed_aggregator_drops_quietly() {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut aggregator = AssertionAggregator::new();
        aggregator.check_true("reported", false);
        aggregator.flush_all().unwrap_err().len()
    }));
    assert_eq!(result.unwrap(), 1);
}

#[test]
fn scoped_run_flushes_after_early_error() {
    let outcome = SoftAssertions::run(|soft| -> Result<(), String> {
        if !soft.check_eq("first", 1, 2) {
            return Err("bailed".to_string());
        }
        soft.check_eq("never reached", 1, 3);
        Ok(())
    });
    assert!(matches!(outcome.exit, ScopeExit::Returned(Err(ref message)) if message == "bailed"));
    let flushed = outcome.flushed.unwrap_err();
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed.failures[0].description, "first");
}

#[test]
fn scoped_run_converts_panics_and_keeps_failures() {
    let outcome = SoftAssertions::run(|soft| -> Result<(), String> {
        soft.check_true("before panic", false);
        panic!("boom");
    });
    match outcome.exit {
        ScopeExit::Panicked {
            message,
            trace,
        } => {
            assert_eq!(message, "boom");
            assert!(trace.starts_with("panicked at "), "unexpected trace: {trace}");
            assert!(trace.contains("assertions_tests.rs"));
        }
        ScopeExit::Returned(_) => panic!("expected a panic exit"),
    }
    assert_eq!(outcome.flushed.unwrap_err().len(), 1);
}

#[test]
fn scoped_run_clean_body_passes() {
    let outcome = SoftAssertions::run(|soft| -> Result<u8, String> {
        soft.check_eq("fine", "a", "a");
        Ok(7)
    });
    assert!(matches!(outcome.exit, ScopeExit::Returned(Ok(7))));
    assert!(outcome.flushed.is_ok());
}
