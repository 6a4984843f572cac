// crates/api-harness-core/src/lifecycle.rs
// ============================================================================
// Module: Lifecycle Notifier
// Description: Test start and outcome events with failure diagnostics.
// Purpose: Give every started test exactly one recorded terminal outcome.
// Dependencies: serde, tracing
// ============================================================================

//! ## Overview
//! [`LifecycleNotifier::on_start`] emits a start event and returns a
//! [`StartedTest`] handle. The handle's terminal methods consume it, so a
//! started test can report success, failure, or skip at most once. A handle
//! dropped without a terminal call still emits a failure, so no started test
//! ends without an outcome.
//!
//! Failures capture an immutable [`DiagnosticSnapshot`] and hand the event to
//! every registered [`ReportSink`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::failure::TestFailure;
use crate::runner::SuiteReport;

// ============================================================================
// SECTION: Identity and Time
// ============================================================================

/// Test identity: a group and a name within it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TestId {
    /// Group (suite or class) name.
    pub group: String,
    /// Test name.
    pub name: String,
}

impl TestId {
    /// Creates a test identity.
    #[must_use]
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.group, self.name)
    }
}

/// Wall-clock instant in unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Current wall-clock time; clocks before the epoch read as zero.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self(millis)
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Diagnostics captured when a test fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticSnapshot {
    /// Failing test.
    test: TestId,
    /// Failure message.
    message: String,
    /// Rendered trace text.
    trace: String,
    /// Capture time.
    captured_at: Timestamp,
}

impl DiagnosticSnapshot {
    /// Captures a snapshot of `failure` for `test`.
    #[must_use]
    pub fn capture(test: &TestId, failure: &TestFailure) -> Self {
        Self {
            test: test.clone(),
            message: failure.message().to_string(),
            trace: failure.trace().to_string(),
            captured_at: Timestamp::now(),
        }
    }

    /// Failing test.
    #[must_use]
    pub const fn test(&self) -> &TestId {
        &self.test
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

    /// Capture time.
    #[must_use]
    pub const fn captured_at(&self) -> Timestamp {
        self.captured_at
    }

    /// Plain-text rendering for log files and attachments.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "test: {}\ncaptured_at_ms: {}\nmessage: {}\n",
            self.test, self.captured_at.0, self.message
        );
        if !self.trace.is_empty() {
            out.push('\n');
            out.push_str(&self.trace);
            if !self.trace.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// What happened to a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEventKind {
    /// Test attempt started.
    Start,
    /// Test attempt passed.
    Success,
    /// Test attempt failed.
    Failure {
        /// Captured diagnostics.
        snapshot: DiagnosticSnapshot,
    },
    /// Test was skipped.
    Skipped {
        /// Skip reason.
        reason: String,
    },
}

impl LifecycleEventKind {
    /// True for success, failure, and skip.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Start)
    }
}

/// One lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    /// Test the event belongs to.
    pub test: TestId,
    /// Emission time.
    pub at: Timestamp,
    /// Event kind.
    #[serde(flatten)]
    pub kind: LifecycleEventKind,
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Receives lifecycle events.
pub trait ReportSink: Send + Sync {
    /// Records one event. Sinks report their own I/O problems.
    fn record(&self, event: &LifecycleEvent);
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Events in emission order.
    events: Mutex<Vec<LifecycleEvent>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recorded event kinds, for compact assertions.
    #[must_use]
    pub fn kinds(&self) -> Vec<LifecycleEventKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }
}

impl ReportSink for MemorySink {
    fn record(&self, event: &LifecycleEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}

// ============================================================================
// SECTION: Notifier
// ============================================================================

/// Fans lifecycle events out to sinks and the log.
#[derive(Clone, Default)]
pub struct LifecycleNotifier {
    /// Registered sinks.
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl fmt::Debug for LifecycleNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleNotifier").field("sinks", &self.sinks.len()).finish()
    }
}

impl LifecycleNotifier {
    /// Creates a notifier with the given sinks.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn ReportSink>>) -> Self {
        Self {
            sinks,
        }
    }

    /// Adds a sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Emits a start event and returns the handle for the outcome.
    #[must_use = "dropping the handle records the test as failed"]
    pub fn on_start(&self, test: TestId) -> StartedTest<'_> {
        info!(test = %test, "starting test");
        self.emit(&test, LifecycleEventKind::Start);
        StartedTest {
            notifier: self,
            test,
            started: Instant::now(),
            finished: false,
        }
    }

    /// Logs the start of a suite.
    pub fn on_suite_start(&self, name: &str) {
        info!(suite = name, "starting test suite");
    }

    /// Logs suite totals.
    pub fn on_suite_finish(&self, report: &SuiteReport) {
        info!(
            suite = %report.name,
            total = report.total(),
            passed = report.passed,
            failed = report.failed,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "test suite finished"
        );
    }

    /// Sends one event to every sink.
    fn emit(&self, test: &TestId, kind: LifecycleEventKind) {
        let event = LifecycleEvent {
            test: test.clone(),
            at: Timestamp::now(),
            kind,
        };
        for sink in &self.sinks {
            sink.record(&event);
        }
    }
}

// ============================================================================
// SECTION: Started Test
// ============================================================================

/// A started test awaiting its single terminal outcome.
#[derive(Debug)]
pub struct StartedTest<'a> {
    /// Notifier that emitted the start event.
    notifier: &'a LifecycleNotifier,
    /// Test identity.
    test: TestId,
    /// Start instant, for duration logging.
    started: Instant,
    /// Set once a terminal event is emitted.
    finished: bool,
}

impl StartedTest<'_> {
    /// Test identity.
    #[must_use]
    pub const fn test(&self) -> &TestId {
        &self.test
    }

    /// Records a pass.
    pub fn on_success(mut self) {
        info!(test = %self.test, elapsed_ms = self.elapsed_ms(), "test passed");
        self.finish(LifecycleEventKind::Success);
    }

    /// Records a failure with captured diagnostics.
    pub fn on_failure(mut self, failure: &TestFailure) {
        let snapshot = DiagnosticSnapshot::capture(&self.test, failure);
        error!(
            test = %self.test,
            elapsed_ms = self.elapsed_ms(),
            message = failure.message(),
            "test failed"
        );
        self.finish(LifecycleEventKind::Failure {
            snapshot,
        });
    }

    /// Records a skip.
    pub fn on_skipped(mut self, reason: &str) {
        warn!(test = %self.test, reason, "test skipped");
        self.finish(LifecycleEventKind::Skipped {
            reason: reason.to_string(),
        });
    }

    /// Milliseconds since the start event.
    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Emits the terminal event once.
    fn finish(&mut self, kind: LifecycleEventKind) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.notifier.emit(&self.test, kind);
    }
}

impl Drop for StartedTest<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let failure = TestFailure::new("test terminated without a recorded outcome");
        error!(test = %self.test, "test terminated without a recorded outcome");
        let snapshot = DiagnosticSnapshot::capture(&self.test, &failure);
        self.finish(LifecycleEventKind::Failure {
            snapshot,
        });
    }
}
