//! Per-run counters and failure records.

use mediaconv_common::{ConversionAction, ItemUri};
use serde::Serialize;

use super::outcome::ConversionOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub uri: ItemUri,
    pub message: String,
}

/// Counters for one conversion run.
///
/// `processed`, `skipped` and the failure list only grow. The consecutive
/// error count goes back to zero on every processed item and is left alone
/// by skipped ones.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStatistics {
    processed: u64,
    skipped: u64,
    consecutive_errors: u32,
    failures: Vec<FailureRecord>,
    /// Versions the converter gave up on part way.
    aborted: u64,
    cleanup_failures: u64,
}

impl ConversionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one outcome.
    pub fn record(&mut self, uri: &ItemUri, outcome: &ConversionOutcome) {
        match outcome.action {
            ConversionAction::Processed => {
                self.processed += 1;
                self.consecutive_errors = 0;
            }
            ConversionAction::Skipped => self.skipped += 1,
            ConversionAction::Failed => self.record_failure(uri, outcome.message.clone()),
        }
    }

    pub fn record_aborted(&mut self) {
        self.aborted += 1;
    }

    /// A prior storage location could not be queued for purge.
    pub fn record_cleanup_failure(&mut self) {
        self.cleanup_failures += 1;
    }

    pub fn record_failure(&mut self, uri: &ItemUri, message: impl Into<String>) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.failures.push(FailureRecord {
            uri: uri.clone(),
            message: message.into(),
        });
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn failed(&self) -> u64 {
        self.failures.len() as u64
    }

    pub fn aborted(&self) -> u64 {
        self.aborted
    }

    pub fn cleanup_failures(&self) -> u64 {
        self.cleanup_failures
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// The three closing status lines of a run.
    pub fn summary_lines(&self) -> [String; 3] {
        [
            format!("Items processed: {}", self.processed),
            format!("Items skipped: {}", self.skipped),
            format!("Items failed: {}", self.failed()),
        ]
    }
}
