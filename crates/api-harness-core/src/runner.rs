// crates/api-harness-core/src/runner.rs
// ============================================================================
// Module: Test Runner
// Description: Explicit retry loop around test bodies with lifecycle reporting.
// Purpose: Run each test with fresh assertions, bounded retries, one outcome per attempt.
// Dependencies: api-harness-config, serde, tracing
// ============================================================================

//! ## Overview
//! [`TestRunner::run`] owns the outer retry loop for one test invocation:
//! each attempt gets a start event, a fresh [`AssertionAggregator`] scoped by
//! [`SoftAssertions`], and exactly one terminal event. Failed attempts ask the
//! [`RetryScheduler`] for another run on this invocation's own [`RetryState`];
//! once the budget is exhausted the last failure is what gets reported.
//!
//! Skips end the loop without retrying. A skip that follows recorded
//! assertion failures counts as a failure.
//!
//! [`RetryState`]: crate::retry::RetryState

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Instant;

use api_harness_config::ConfigStore;
use serde::Serialize;
use tracing::info_span;

use crate::assertions::AssertionAggregator;
use crate::assertions::ScopeExit;
use crate::assertions::ScopedOutcome;
use crate::assertions::SoftAssertions;
use crate::failure::TestError;
use crate::failure::TestFailure;
use crate::lifecycle::LifecycleNotifier;
use crate::lifecycle::TestId;
use crate::retry::RetryPolicy;
use crate::retry::RetryScheduler;

// ============================================================================
// SECTION: Context and Cases
// ============================================================================

/// Per-attempt context handed to a test body.
#[derive(Debug)]
pub struct TestContext<'a> {
    /// Test identity.
    pub test: &'a TestId,
    /// Run number, starting at 1.
    pub attempt: u32,
    /// Soft assertions for this attempt.
    pub soft: &'a mut AssertionAggregator,
}

/// Boxed test body.
pub type TestBody = Box<dyn FnMut(&mut TestContext<'_>) -> Result<(), TestError>>;

/// A named test body for suite runs.
pub struct TestCase {
    /// Test identity.
    pub id: TestId,
    /// Body executed on each attempt.
    pub body: TestBody,
}

impl TestCase {
    /// Creates a test case.
    #[must_use]
    pub fn new<F>(id: TestId, body: F) -> Self
    where
        F: FnMut(&mut TestContext<'_>) -> Result<(), TestError> + 'static,
    {
        Self {
            id,
            body: Box::new(body),
        }
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase").field("id", &self.id).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Final status of one test invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Some attempt passed.
    Passed,
    /// Every permitted attempt failed.
    Failed,
    /// The body skipped.
    Skipped,
}

impl TestStatus {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Outcome of one test invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestReport {
    /// Test identity.
    pub test: TestId,
    /// Final status.
    pub status: TestStatus,
    /// Number of runs, including the first.
    pub attempts: u32,
    /// Last failure when the status is failed.
    pub failure: Option<TestFailure>,
    /// Skip reason when the status is skipped.
    pub skip_reason: Option<String>,
    /// Wall time across all attempts.
    pub duration_ms: u64,
}

/// Totals for a suite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    /// Suite name.
    pub name: String,
    /// Per-test reports in run order.
    pub tests: Vec<TestReport>,
    /// Passed count.
    pub passed: usize,
    /// Failed count.
    pub failed: usize,
    /// Skipped count.
    pub skipped: usize,
    /// Wall time of the suite.
    pub duration_ms: u64,
}

impl SuiteReport {
    /// Builds totals from per-test reports.
    #[must_use]
    pub fn from_reports(name: impl Into<String>, tests: Vec<TestReport>, duration_ms: u64) -> Self {
        let count = |status: TestStatus| tests.iter().filter(|report| report.status == status).count();
        let passed = count(TestStatus::Passed);
        let failed = count(TestStatus::Failed);
        let skipped = count(TestStatus::Skipped);
        Self {
            name: name.into(),
            tests,
            passed,
            failed,
            skipped,
            duration_ms,
        }
    }

    /// Number of tests run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.tests.len()
    }

    /// True when no test failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Result of one attempt after assertions are flushed.
enum AttemptOutcome {
    /// Body returned `Ok` and no soft assertion failed.
    Passed,
    /// Body skipped cleanly.
    Skipped(String),
    /// Anything else.
    Failed(TestFailure),
}

/// Executes test bodies with retries and lifecycle events.
#[derive(Debug, Clone)]
pub struct TestRunner {
    /// Event fan-out.
    notifier: LifecycleNotifier,
    /// Retry bounds for each invocation.
    policy: RetryPolicy,
    /// Retry decisions and waits.
    scheduler: RetryScheduler,
}

impl TestRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(notifier: LifecycleNotifier, policy: RetryPolicy) -> Self {
        Self {
            notifier,
            policy,
            scheduler: RetryScheduler::new(),
        }
    }

    /// Creates a runner whose retry policy is read from configuration.
    #[must_use]
    pub fn from_config(notifier: LifecycleNotifier, config: &ConfigStore) -> Self {
        Self::new(notifier, RetryPolicy::from_config(config))
    }

    /// Replaces the scheduler, e.g. to share an interrupt handle.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: RetryScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Retry scheduler used between attempts.
    #[must_use]
    pub const fn scheduler(&self) -> &RetryScheduler {
        &self.scheduler
    }

    /// Lifecycle notifier.
    #[must_use]
    pub const fn notifier(&self) -> &LifecycleNotifier {
        &self.notifier
    }

    /// Retry policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `body` until it passes, skips, or exhausts its retries.
    pub fn run<F>(&self, test: TestId, mut body: F) -> TestReport
    where
        F: FnMut(&mut TestContext<'_>) -> Result<(), TestError>,
    {
        let _span = info_span!("test", test = %test).entered();
        let started = Instant::now();
        let mut state = self.scheduler.begin(&self.policy);
        let mut runs: u32 = 0;
        loop {
            runs += 1;
            let handle = self.notifier.on_start(test.clone());
            let scoped = SoftAssertions::run(|soft| {
                let mut ctx = TestContext {
                    test: &test,
                    attempt: runs,
                    soft,
                };
                body(&mut ctx)
            });
            let (status, failure, skip_reason) = match classify(scoped) {
                AttemptOutcome::Passed => {
                    handle.on_success();
                    (TestStatus::Passed, None, None)
                }
                AttemptOutcome::Skipped(reason) => {
                    handle.on_skipped(&reason);
                    (TestStatus::Skipped, None, Some(reason))
                }
                AttemptOutcome::Failed(failure) => {
                    handle.on_failure(&failure);
                    if self.scheduler.should_retry(&mut state, &test) {
                        continue;
                    }
                    (TestStatus::Failed, Some(failure), None)
                }
            };
            return TestReport {
                test,
                status,
                attempts: runs,
                failure,
                skip_reason,
                duration_ms: elapsed_ms(started),
            };
        }
    }

    /// Runs every case in order and reports totals.
    pub fn run_suite(&self, name: &str, cases: Vec<TestCase>) -> SuiteReport {
        let _span = info_span!("suite", suite = name).entered();
        let started = Instant::now();
        self.notifier.on_suite_start(name);
        let reports = cases.into_iter().map(|case| self.run(case.id, case.body)).collect();
        let report = SuiteReport::from_reports(name, reports, elapsed_ms(started));
        self.notifier.on_suite_finish(&report);
        report
    }
}

/// Folds the body result and flushed assertions into one attempt outcome.
fn classify(scoped: ScopedOutcome<(), TestError>) -> AttemptOutcome {
    let ScopedOutcome {
        exit,
        flushed,
    } = scoped;
    let failure = match (exit, flushed) {
        (ScopeExit::Returned(Ok(())), Ok(())) => return AttemptOutcome::Passed,
        (ScopeExit::Returned(Err(TestError::Skipped(reason))), Ok(())) => {
            return AttemptOutcome::Skipped(reason);
        }
        (ScopeExit::Returned(Ok(())), Err(assertions)) => TestFailure::from_error(&assertions),
        (ScopeExit::Returned(Err(TestError::Failed(failure))), Ok(())) => failure,
        (ScopeExit::Returned(Err(TestError::Failed(failure))), Err(assertions)) => {
            failure.with_assertions(&assertions)
        }
        (ScopeExit::Returned(Err(TestError::Skipped(reason))), Err(assertions)) => {
            TestFailure::new(format!("skip requested after failed assertions: {reason}"))
                .with_assertions(&assertions)
        }
        (
            ScopeExit::Panicked {
                message,
                trace,
            },
            Ok(()),
        ) => TestFailure::from_panic(&message, trace),
        (
            ScopeExit::Panicked {
                message,
                trace,
            },
            Err(assertions),
        ) => TestFailure::from_panic(&message, trace).with_assertions(&assertions),
    };
    AttemptOutcome::Failed(failure)
}

/// Milliseconds since `started`.
fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
