//! Per-session and batch-level decoding reports.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::decoder::DecodeStats;
use crate::eval::AlignmentErrors;

/// Result of decoding one observation file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    pub path: PathBuf,
    pub reference: Option<String>,       // Reference transcription, if present
    pub hypothesis: String,              // Space-joined output symbols
    pub errors: Option<AlignmentErrors>, // Only when a reference exists
    pub word_count: usize,               // Reference word count
    pub reached_completion: bool,
    pub cost: Option<f64>,
    pub decode_secs: f64,
    pub backtrace_secs: f64,
    pub stats: Option<DecodeStats>,
    pub error: Option<String>, // Set when the session failed outright
}

impl SessionReport {
    /// Report for a session that could not be decoded at all.
    pub fn failed(path: &Path, error: &anyhow::Error) -> Self {
        Self { path: path.to_path_buf(), error: Some(format!("{:#}", error)), ..Default::default() }
    }
}

/// Aggregated report over a batch of sessions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub sessions: Vec<SessionReport>,
    pub fst_states: usize,
    pub fst_arcs: usize, // Counted as one per state plus one per arc
    pub cancelled: bool,
}

impl BatchReport {
    pub fn new(fst_states: usize, fst_arcs: usize) -> Self {
        Self { fst_states, fst_arcs, ..Default::default() }
    }

    /// Summed alignment errors over every scored session.
    pub fn total_errors(&self) -> AlignmentErrors {
        let mut total = AlignmentErrors::default();
        for errors in self.sessions.iter().filter_map(|s| s.errors) {
            total += errors;
        }
        total
    }

    /// Reference words over every scored session.
    pub fn total_words(&self) -> usize {
        self.sessions.iter().filter(|s| s.errors.is_some()).map(|s| s.word_count).sum()
    }

    /// Overall word error rate, `None` when nothing was scored.
    pub fn wer(&self) -> Option<f64> {
        let words = self.total_words();
        (words > 0).then(|| self.total_errors().total() as f64 / words as f64)
    }

    fn decoded(&self) -> impl Iterator<Item = &SessionReport> {
        self.sessions.iter().filter(|s| s.error.is_none())
    }

    pub fn average_decode_secs(&self) -> Option<f64> {
        average(self.decoded().map(|s| s.decode_secs))
    }

    pub fn average_backtrace_secs(&self) -> Option<f64> {
        average(self.decoded().map(|s| s.backtrace_secs))
    }

    /// Sessions that failed outright.
    pub fn failures(&self) -> usize {
        self.sessions.iter().filter(|s| s.error.is_some()).count()
    }

    /// Sessions decoded without any path reaching a final state.
    pub fn incomplete(&self) -> usize {
        self.decoded().filter(|s| !s.reached_completion).count()
    }

    /// Log a summary of the batch.
    pub fn log_summary(&self) {
        info!("📊 Decoded {} session(s)", self.sessions.len());
        if let Some(wer) = self.wer() {
            let errors = self.total_errors();
            info!(
                "  Total WER: {:.4} ({} sub, {} del, {} ins over {} words)",
                wer, errors.substitutions, errors.deletions, errors.insertions, self.total_words()
            );
        }
        if let Some(secs) = self.average_decode_secs() {
            info!("  Average decode() time: {:.4}s", secs);
        }
        if let Some(secs) = self.average_backtrace_secs() {
            info!("  Average backtrace() time: {:.6}s", secs);
        }
        info!("  FST number of states: {}", self.fst_states);
        info!("  FST number of arcs: {}", self.fst_arcs);

        if self.incomplete() > 0 {
            warn!("  {} session(s) had no complete path", self.incomplete());
        }
        if self.failures() > 0 {
            warn!("  {} session(s) failed", self.failures());
        }
        if self.cancelled {
            warn!("  Batch was cancelled before all sessions were scheduled");
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
