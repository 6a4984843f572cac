// crates/api-harness-core/src/lib.rs
// ============================================================================
// Module: API Harness Core Library
// Description: Orchestration engine for HTTP API test execution.
// Purpose: Make test runs deterministic and diagnosable against a flaky peer.
// Dependencies: api-harness-config, jsonschema, reqwest, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! The core turns a [`ConfigStore`](api_harness_config::ConfigStore) into
//! reusable [`RequestTemplate`]s, executes test bodies through a
//! [`TestRunner`] that owns the retry loop, collects soft assertion failures
//! in an [`AssertionAggregator`] that is flushed on every exit path, and
//! reports lifecycle events through a [`LifecycleNotifier`].
//!
//! Invariants:
//! - Each test invocation owns its retry state and aggregator exclusively.
//! - A started test produces exactly one terminal lifecycle event.
//! - A recorded soft-assertion failure is never reported as a pass.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod artifacts;
pub mod assertions;
pub mod checks;
pub mod client;
pub mod failure;
pub mod lifecycle;
pub mod resource;
pub mod response;
pub mod retry;
pub mod runner;
pub mod telemetry;
pub mod template;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod assertions_tests;
#[cfg(test)]
mod template_tests;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use artifacts::ArtifactError;
pub use artifacts::ArtifactSink;
pub use artifacts::write_suite_summary;
pub use assertions::AggregateAssertionError;
pub use assertions::AssertionAggregator;
pub use assertions::AssertionFailure;
pub use assertions::ScopeExit;
pub use assertions::ScopedOutcome;
pub use assertions::SoftAssertions;
pub use checks::JsonSchemaFile;
pub use checks::SchemaError;
pub use checks::SchemaValidator;
pub use client::ApiRequest;
pub use client::ClientError;
pub use client::ClientRegistry;
pub use client::ClientSettings;
pub use client::DiagnosticFilter;
pub use client::Exchange;
pub use client::LogExchangeFilter;
pub use failure::TestError;
pub use failure::TestFailure;
pub use lifecycle::DiagnosticSnapshot;
pub use lifecycle::LifecycleEvent;
pub use lifecycle::LifecycleEventKind;
pub use lifecycle::LifecycleNotifier;
pub use lifecycle::MemorySink;
pub use lifecycle::ReportSink;
pub use lifecycle::StartedTest;
pub use lifecycle::TestId;
pub use lifecycle::Timestamp;
pub use resource::ResourceService;
pub use resource::unique_name;
pub use response::ApiResponse;
pub use retry::RetryInterrupt;
pub use retry::RetryPolicy;
pub use retry::RetryScheduler;
pub use retry::RetryState;
pub use runner::SuiteReport;
pub use runner::TestBody;
pub use runner::TestCase;
pub use runner::TestContext;
pub use runner::TestReport;
pub use runner::TestRunner;
pub use runner::TestStatus;
pub use telemetry::init_logging;
pub use template::ExpectationMismatch;
pub use template::ExpectedOutcome;
pub use template::RequestTemplate;
pub use template::ResponseExpectation;
