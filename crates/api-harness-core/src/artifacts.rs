// crates/api-harness-core/src/artifacts.rs
// ============================================================================
// Module: Failure Artifacts
// Description: File-backed report sink and suite summaries.
// Purpose: Persist failure snapshots and run totals as deterministic files.
// Dependencies: serde, serde_jcs, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`ArtifactSink`] is a [`ReportSink`] that writes each failure snapshot
//! under `<root>/<group>/<name>/` as canonical JSON (`failure-NNN.json`) and
//! plain text (`failure-NNN.txt`). Non-failure events are ignored.
//! [`write_suite_summary`] writes `summary.json` and `summary.md` for a suite
//! run at the root.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::lifecycle::DiagnosticSnapshot;
use crate::lifecycle::LifecycleEvent;
use crate::lifecycle::LifecycleEventKind;
use crate::lifecycle::ReportSink;
use crate::lifecycle::TestId;
use crate::runner::SuiteReport;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors writing artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Filesystem failure.
    #[error("artifact io error at {path}: {message}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// I/O message.
        message: String,
    },
    /// Canonical JSON serialization failed.
    #[error("artifact serialization failed: {0}")]
    Serialize(String),
}

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Report sink that writes failure snapshots to disk.
#[derive(Debug)]
pub struct ArtifactSink {
    /// Artifact root directory.
    root: PathBuf,
    /// Failures written per test, for file numbering.
    counters: Mutex<BTreeMap<TestId, u32>>,
}

impl ArtifactSink {
    /// Creates the sink, creating `root` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Io`] when the root cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| io_error(&root, &err))?;
        Ok(Self {
            root,
            counters: Mutex::new(BTreeMap::new()),
        })
    }

    /// Artifact root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding artifacts for `test`.
    #[must_use]
    pub fn test_dir(&self, test: &TestId) -> PathBuf {
        self.root.join(sanitize_segment(&test.group)).join(sanitize_segment(&test.name))
    }

    /// Writes one failure snapshot; returns the JSON and text paths.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] when a file cannot be written.
    pub fn write_failure(
        &self,
        snapshot: &DiagnosticSnapshot,
    ) -> Result<(PathBuf, PathBuf), ArtifactError> {
        let index = {
            let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
            let counter = counters.entry(snapshot.test().clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        let dir = self.test_dir(snapshot.test());
        fs::create_dir_all(&dir).map_err(|err| io_error(&dir, &err))?;
        let json_path = dir.join(format!("failure-{index:03}.json"));
        let text_path = dir.join(format!("failure-{index:03}.txt"));
        write_json(&json_path, snapshot)?;
        write_text(&text_path, &snapshot.render_text())?;
        Ok((json_path, text_path))
    }
}

impl ReportSink for ArtifactSink {
    fn record(&self, event: &LifecycleEvent) {
        let LifecycleEventKind::Failure {
            snapshot,
        } = &event.kind
        else {
            return;
        };
        if let Err(err) = self.write_failure(snapshot) {
            error!(test = %event.test, error = %err, "failed to write failure artifact");
        }
    }
}

// ============================================================================
// SECTION: Suite Summary
// ============================================================================

/// Writes `summary.json` and `summary.md` for a suite under `root`.
///
/// # Errors
///
/// Returns [`ArtifactError`] when a file cannot be written.
pub fn write_suite_summary(
    root: &Path,
    report: &SuiteReport,
) -> Result<Vec<PathBuf>, ArtifactError> {
    fs::create_dir_all(root).map_err(|err| io_error(root, &err))?;
    let json_path = root.join("summary.json");
    let md_path = root.join("summary.md");
    write_json(&json_path, report)?;
    write_text(&md_path, &summary_markdown(report))?;
    Ok(vec![json_path, md_path])
}

/// Renders a suite report as Markdown.
#[must_use]
pub fn summary_markdown(report: &SuiteReport) -> String {
    let mut out = String::new();
    out.push_str("# API Harness Summary\n\n");
    out.push_str("## Totals\n\n");
    out.push_str(&format!("- Suite: {}\n", report.name));
    out.push_str(&format!("- Total: {}\n", report.total()));
    out.push_str(&format!("- Passed: {}\n", report.passed));
    out.push_str(&format!("- Failed: {}\n", report.failed));
    out.push_str(&format!("- Skipped: {}\n", report.skipped));
    out.push_str(&format!("- Duration (ms): {}\n", report.duration_ms));
    out.push_str("\n## Tests\n\n");
    if report.tests.is_empty() {
        out.push_str("- None\n");
    }
    for test in &report.tests {
        out.push_str(&format!(
            "- {}: {} ({} attempt(s), {} ms)\n",
            test.test,
            test.status.as_str(),
            test.attempts,
            test.duration_ms
        ));
        if let Some(failure) = &test.failure {
            let first_line = failure.message().lines().next().unwrap_or_default();
            out.push_str(&format!("  - {first_line}\n"));
        }
        if let Some(reason) = &test.skip_reason {
            out.push_str(&format!("  - skipped: {reason}\n"));
        }
    }
    out
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes a value as canonical JSON.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let bytes = serde_jcs::to_vec(value).map_err(|err| ArtifactError::Serialize(err.to_string()))?;
    fs::write(path, bytes).map_err(|err| io_error(path, &err))
}

/// Writes UTF-8 text.
fn write_text(path: &Path, value: &str) -> Result<(), ArtifactError> {
    fs::write(path, value.as_bytes()).map_err(|err| io_error(path, &err))
}

/// Wraps an I/O error with its path.
fn io_error(path: &Path, err: &std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Maps a name to a single safe path segment.
fn sanitize_segment(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') { ch } else { '_' }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|ch| ch == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
