// crates/api-harness-core/src/retry.rs
// ============================================================================
// Module: Retry Scheduler
// Description: Bounded, fixed-delay re-execution decisions for failed tests.
// Purpose: Absorb transient failures without masking persistent ones.
// Dependencies: api-harness-config, tracing
// ============================================================================

//! ## Overview
//! A [`RetryPolicy`] is read from configuration and hands out one
//! [`RetryState`] per test invocation. [`RetryScheduler::should_retry`] answers
//! true at most `max_attempts` times for a given state, blocking the calling
//! thread for the configured delay before each positive answer. The delay is
//! fixed, not exponential.
//!
//! A [`RetryInterrupt`] shortens a pending wait (or the next one within the
//! same invocation). The retry still happens; the interruption is logged and
//! otherwise ignored. [`RetryScheduler::begin`] discards interrupts left over
//! from an earlier invocation, and a cloned scheduler gets its own signal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use api_harness_config::ConfigStore;
use api_harness_config::keys;
use tracing::info;
use tracing::warn;

use crate::lifecycle::TestId;

// ============================================================================
// SECTION: Policy and State
// ============================================================================

/// Retry bounds shared by every invocation under one runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of re-executions after the first run.
    pub max_attempts: u32,
    /// Fixed wait before each re-execution.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            keys::DEFAULT_RETRY_COUNT,
            Duration::from_millis(keys::DEFAULT_RETRY_INTERVAL_MS),
        )
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Reads `retry.count` and `retry.interval`, falling back to defaults.
    #[must_use]
    pub fn from_config(config: &ConfigStore) -> Self {
        Self::new(config.retry_count(), config.retry_interval())
    }

    /// Fresh state for one test invocation.
    #[must_use]
    pub const fn new_state(&self) -> RetryState {
        RetryState {
            attempts: 0,
            max_attempts: self.max_attempts,
            delay: self.delay,
        }
    }
}

/// Per-invocation retry bookkeeping. Never reset automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// Retries granted so far.
    attempts: u32,
    /// Upper bound on `attempts`.
    max_attempts: u32,
    /// Wait before each retry.
    delay: Duration,
}

impl RetryState {
    /// Retries granted so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Upper bound on retries.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before each retry.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// True once no further retries will be granted.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

// ============================================================================
// SECTION: Interrupt
// ============================================================================

/// Handle that cuts a scheduler's pending wait short.
#[derive(Debug, Clone, Default)]
pub struct RetryInterrupt {
    /// Pending-interrupt flag and its wakeup signal.
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl RetryInterrupt {
    /// Requests that the current (or next) wait end immediately.
    pub fn interrupt(&self) {
        let (flag, signal) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        signal.notify_all();
    }

    /// Drops a pending interrupt that no wait consumed.
    fn clear(&self) {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Waits up to `delay`; returns true when the wait was interrupted.
    fn wait(&self, delay: Duration) -> bool {
        let (flag, signal) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = signal
            .wait_timeout_while(guard, delay, |interrupted| !*interrupted)
            .unwrap_or_else(PoisonError::into_inner);
        let interrupted = *guard;
        *guard = false;
        interrupted
    }
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Decides whether a failed test runs again.
#[derive(Debug, Default)]
pub struct RetryScheduler {
    /// Interrupt shared with handles from [`Self::interrupt_handle`].
    interrupt: RetryInterrupt,
}

impl Clone for RetryScheduler {
    /// A clone waits on its own signal; handles of the original do not reach it.
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl RetryScheduler {
    /// Creates a scheduler with its own interrupt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that interrupts this scheduler's waits.
    #[must_use]
    pub fn interrupt_handle(&self) -> RetryInterrupt {
        self.interrupt.clone()
    }

    /// Starts a test invocation: fresh retry state, no stale interrupt.
    #[must_use]
    pub fn begin(&self, policy: &RetryPolicy) -> RetryState {
        self.interrupt.clear();
        policy.new_state()
    }

    /// Grants a retry while `state` has budget left.
    ///
    /// On a positive answer the attempt counter is incremented and the
    /// calling thread blocks for the state's delay before returning.
    pub fn should_retry(&self, state: &mut RetryState, test: &TestId) -> bool {
        if state.is_exhausted() {
            return false;
        }
        state.attempts += 1;
        warn!(
            test = %test,
            attempt = state.attempts,
            max_attempts = state.max_attempts,
            delay_ms = u64::try_from(state.delay.as_millis()).unwrap_or(u64::MAX),
            "retrying failed test (attempt {} of {})",
            state.attempts,
            state.max_attempts
        );
        if !state.delay.is_zero() && self.interrupt.wait(state.delay) {
            info!(test = %test, "retry wait interrupted; retrying now");
        }
        true
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use std::thread;
    use std::time::Instant;

    use super::*;

    fn test_id() -> TestId {
        TestId::new("retry", "unit")
    }

    #[test]
    fn grants_exactly_max_attempts() {
        let scheduler = RetryScheduler::new();
        let mut state = RetryPolicy::new(2, Duration::ZERO).new_state();
        let answers: Vec<bool> =
            (0 .. 5).map(|_| scheduler.should_retry(&mut state, &test_id())).collect();
        assert_eq!(answers, vec![true, true, false, false, false]);
        assert_eq!(state.attempts(), 2);
    }

    #[test]
    fn zero_budget_never_retries() {
        let scheduler = RetryScheduler::new();
        let mut state = RetryPolicy::new(0, Duration::ZERO).new_state();
        assert!(!scheduler.should_retry(&mut state, &test_id()));
        assert_eq!(state.attempts(), 0);
    }

    #[test]
    fn waits_for_the_configured_delay() {
        let scheduler = RetryScheduler::new();
        let mut state = RetryPolicy::new(1, Duration::from_millis(40)).new_state();
        let started = Instant::now();
        assert!(scheduler.should_retry(&mut state, &test_id()));
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn interrupt_shortens_wait_but_still_retries() {
        let scheduler = RetryScheduler::new();
        let handle = scheduler.interrupt_handle();
        let mut state = RetryPolicy::new(1, Duration::from_secs(30)).new_state();
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.interrupt();
        });
        let started = Instant::now();
        assert!(scheduler.should_retry(&mut state, &test_id()));
        assert!(started.elapsed() < Duration::from_secs(30));
        waker.join().unwrap();
    }

    #[test]
    fn interrupt_is_local_to_one_scheduler() {
        let interrupted = RetryScheduler::new();
        let other = RetryScheduler::new();
        interrupted.interrupt_handle().interrupt();
        let mut state = RetryPolicy::new(1, Duration::from_millis(30)).new_state();
        let started = Instant::now();
        assert!(other.should_retry(&mut state, &test_id()));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn begin_discards_an_unconsumed_interrupt() {
        let scheduler = RetryScheduler::new();
        let policy = RetryPolicy::new(1, Duration::from_millis(30));
        scheduler.interrupt_handle().interrupt();
        let mut state = scheduler.begin(&policy);
        let started = Instant::now();
        assert!(scheduler.should_retry(&mut state, &test_id()));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cloned_scheduler_has_its_own_signal() {
        let original = RetryScheduler::new();
        let clone = original.clone();
        original.interrupt_handle().interrupt();
        let mut state = RetryPolicy::new(1, Duration::from_millis(30)).new_state();
        let started = Instant::now();
        assert!(clone.should_retry(&mut state, &test_id()));
        assert!(started.elapsed() >= Duration::from_millis(30));

        let mut state = RetryPolicy::new(1, Duration::from_secs(30)).new_state();
        let started = Instant::now();
        assert!(original.should_retry(&mut state, &test_id()));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn policy_reads_config_with_defaults() {
        let store = ConfigStore::default();
        assert_eq!(RetryPolicy::from_config(&store), RetryPolicy::default());
        assert_eq!(RetryPolicy::default().max_attempts, 2);
        assert_eq!(RetryPolicy::default().delay, Duration::from_millis(1_000));
    }
}
