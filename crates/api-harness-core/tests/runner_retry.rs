//! Retry and lifecycle tests for the api-harness-core runner.
// crates/api-harness-core/tests/runner_retry.rs
// ============================================================================
// Module: Runner Retry Tests
// Description: Outer retry loop, soft assertion flushing, and event pairing.
// Purpose: Ensure retries are bounded and every attempt reports one outcome.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use api_harness_config::ConfigOverrides;
use api_harness_config::ConfigStore;
use api_harness_config::keys;
use api_harness_core::LifecycleEventKind;
use api_harness_core::LifecycleNotifier;
use api_harness_core::MemorySink;
use api_harness_core::RetryPolicy;
use api_harness_core::RetryScheduler;
use api_harness_core::TestCase;
use api_harness_core::TestError;
use api_harness_core::TestId;
use api_harness_core::TestRunner;
use api_harness_core::TestStatus;
use proptest::prelude::*;

fn runner(max_attempts: u32) -> (TestRunner, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let notifier = LifecycleNotifier::default().with_sink(sink.clone());
    (TestRunner::new(notifier, RetryPolicy::new(max_attempts, Duration::ZERO)), sink)
}

fn kind_labels(sink: &MemorySink) -> Vec<&'static str> {
    sink.kinds()
        .iter()
        .map(|kind| match kind {
            LifecycleEventKind::Start => "start",
            LifecycleEventKind::Success => "success",
            LifecycleEventKind::Failure { .. } => "failure",
            LifecycleEventKind::Skipped { .. } => "skipped",
        })
        .collect()
}

#[test]
fn flaky_test_passes_on_third_run() {
    let store = ConfigStore::from_values(
        [(keys::RETRY_COUNT, "2"), (keys::RETRY_INTERVAL, "0")],
        ConfigOverrides::none(),
    );
    let sink = Arc::new(MemorySink::new());
    let runner = TestRunner::from_config(LifecycleNotifier::default().with_sink(sink.clone()), &store);
    let mut calls = 0;
    let report = runner.run(TestId::new("users", "flaky"), |ctx| {
        calls += 1;
        assert_eq!(ctx.attempt, calls);
        if calls < 3 { Err(TestError::fail(format!("transient {calls}"))) } else { Ok(()) }
    });
    assert_eq!(report.status, TestStatus::Passed);
    assert_eq!(report.attempts, 3);
    assert!(report.failure.is_none());
    assert_eq!(
        kind_labels(&sink),
        vec!["start", "failure", "start", "failure", "start", "success"]
    );
}

#[test]
fn exhausted_retries_report_the_last_failure() {
    let (runner, sink) = runner(2);
    let mut calls = 0;
    let report = runner.run(TestId::new("users", "broken"), |_| {
        calls += 1;
        Err(TestError::fail(format!("attempt {calls} failed")))
    });
    assert_eq!(report.status, TestStatus::Failed);
    assert_eq!(report.attempts, 3);
    assert_eq!(report.failure.unwrap().message(), "attempt 3 failed");
    assert_eq!(kind_labels(&sink).iter().filter(|label| **label == "failure").count(), 3);
}

#[test]
fn skips_are_not_retried() {
    let (runner, sink) = runner(2);
    let report = runner.run(TestId::new("users", "update"), |_| Err(TestError::skip("no user")));
    assert_eq!(report.status, TestStatus::Skipped);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.skip_reason.as_deref(), Some("no user"));
    assert_eq!(kind_labels(&sink), vec!["start", "skipped"]);
}

#[test]
fn soft_failures_fail_an_ok_body() {
    let (runner, sink) = runner(0);
    let report = runner.run(TestId::new("users", "fields"), |ctx| {
        ctx.soft.record("id not null", "non-null value", "null", false);
        ctx.soft.check_eq("status code", 200, 500);
        Ok(())
    });
    assert_eq!(report.status, TestStatus::Failed);
    let message = report.failure.unwrap().message().to_string();
    assert!(message.contains("2 assertion(s) failed"));
    assert!(message.contains("id not null"));
    assert!(message.contains("status code"));
    assert_eq!(kind_labels(&sink), vec!["start", "failure"]);
}

#[test]
fn skip_after_soft_failure_counts_as_failure() {
    let (runner, _sink) = runner(0);
    let report = runner.run(TestId::new("users", "skip"), |ctx| {
        ctx.soft.check_true("precondition", false);
        Err(TestError::skip("giving up"))
    });
    assert_eq!(report.status, TestStatus::Failed);
    assert!(report.failure.unwrap().message().contains("precondition"));
}

#[test]
fn panicking_body_is_a_retried_failure() {
    let (runner, sink) = runner(1);
    let report = runner.run(TestId::new("users", "panics"), |_| -> Result<(), TestError> {
        panic!("unexpected null");
    });
    assert_eq!(report.status, TestStatus::Failed);
    assert_eq!(report.attempts, 2);
    let failure = report.failure.unwrap();
    assert!(failure.message().contains("unexpected null"));
    assert!(failure.trace().contains("runner_retry.rs"), "unexpected trace: {}", failure.trace());
    assert_eq!(kind_labels(&sink), vec!["start", "failure", "start", "failure"]);
}

#[test]
fn zero_retry_budget_runs_once() {
    let store = ConfigStore::from_values([(keys::RETRY_COUNT, "0")], ConfigOverrides::none());
    let runner = TestRunner::from_config(LifecycleNotifier::default(), &store);
    let report = runner.run(TestId::new("g", "n"), |_| Err(TestError::fail("no")));
    assert_eq!(report.attempts, 1);
}

#[test]
fn interrupt_cuts_a_long_retry_wait() {
    let scheduler = RetryScheduler::new();
    let handle = scheduler.interrupt_handle();
    let runner = TestRunner::new(LifecycleNotifier::default(), RetryPolicy::new(1, Duration::from_secs(60)))
        .with_scheduler(scheduler);
    let report = runner.run(TestId::new("g", "interrupted"), |ctx| {
        if ctx.attempt == 1 {
            handle.interrupt();
            Err(TestError::fail("first"))
        } else {
            Ok(())
        }
    });
    assert_eq!(report.status, TestStatus::Passed);
    assert!(report.duration_ms < 60_000);
}

#[test]
fn interrupt_does_not_leak_into_the_next_test() {
    let scheduler = RetryScheduler::new();
    let handle = scheduler.interrupt_handle();
    let runner = TestRunner::new(LifecycleNotifier::default(), RetryPolicy::new(1, Duration::from_millis(200)))
        .with_scheduler(scheduler);
    let mut second_calls = 0;
    let cases = vec![
        TestCase::new(TestId::new("suite", "interrupts"), move |_| {
            handle.interrupt();
            Ok(())
        }),
        TestCase::new(TestId::new("suite", "flaky"), move |_| {
            second_calls += 1;
            if second_calls == 1 { Err(TestError::fail("transient")) } else { Ok(()) }
        }),
    ];
    let report = runner.run_suite("interrupts", cases);
    let flaky = &report.tests[1];
    assert_eq!(flaky.status, TestStatus::Passed);
    assert_eq!(flaky.attempts, 2);
    assert!(flaky.duration_ms >= 200, "retry wait was cut short: {} ms", flaky.duration_ms);
}

#[test]
fn cloned_runner_ignores_the_original_interrupt() {
    let runner = TestRunner::new(LifecycleNotifier::default(), RetryPolicy::new(1, Duration::from_millis(200)));
    let other = runner.clone();
    let handle = runner.scheduler().interrupt_handle();
    let started = Instant::now();
    let report = other.run(TestId::new("g", "cloned"), |ctx| {
        if ctx.attempt == 1 {
            let handle = handle.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                handle.interrupt();
            });
            Err(TestError::fail("first"))
        } else {
            Ok(())
        }
    });
    assert_eq!(report.attempts, 2);
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[test]
fn suite_totals_cover_every_case() {
    let (runner, _sink) = runner(0);
    let cases = vec![
        TestCase::new(TestId::new("suite", "pass"), |_| Ok(())),
        TestCase::new(TestId::new("suite", "fail"), |_| Err(TestError::fail("bad"))),
        TestCase::new(TestId::new("suite", "skip"), |_| Err(TestError::skip("later"))),
    ];
    let report = runner.run_suite("users", cases);
    assert_eq!(report.total(), 3);
    assert_eq!((report.passed, report.failed, report.skipped), (1, 1, 1));
    assert!(!report.is_success());
    assert_eq!(report.tests[1].test.name, "fail");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn starts_always_pair_with_terminals(max_attempts in 0u32 .. 4, passes_on in 1u32 .. 6) {
        let (runner, sink) = runner(max_attempts);
        let report = runner.run(TestId::new("prop", "pairing"), |ctx| {
            if ctx.attempt >= passes_on { Ok(()) } else { Err(TestError::fail("not yet")) }
        });
        let kinds = sink.kinds();
        let starts = kinds.iter().filter(|kind| !kind.is_terminal()).count();
        let terminals = kinds.iter().filter(|kind| kind.is_terminal()).count();
        prop_assert_eq!(starts, terminals);
        prop_assert_eq!(u32::try_from(starts).unwrap(), report.attempts);
        prop_assert!(report.attempts <= max_attempts + 1);
        prop_assert_eq!(report.status == TestStatus::Passed, passes_on <= max_attempts + 1);
    }
}
