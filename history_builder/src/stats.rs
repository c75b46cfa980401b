//! Run-wide counters.
//!
//! A [`RunStatistics`] value is owned by the coordinating task of one run and
//! updated from completed symbol reports, so it needs no locking.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::orchestrator::SymbolReport;

/// Aggregate outcome of one run. Created fresh per run, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// Set by [`finish`](Self::finish).
    pub finished_at: Option<DateTime<Utc>>,
    /// Symbols whose task ran to completion (selectable or not).
    pub symbols_processed: usize,
    /// Selectable symbols, in completion order.
    pub symbols_completed: Vec<String>,
    /// Unselectable or crashed symbols, in completion order.
    pub symbols_failed: Vec<String>,
    /// Symbols never started because the run was interrupted.
    pub symbols_skipped: Vec<String>,
    /// Newly inserted rows.
    pub total_bars_downloaded: usize,
    /// Records dropped by the sanitizer.
    pub bars_rejected: usize,
    /// Selection, fetch and write errors plus crashed tasks.
    pub errors: usize,
    /// The shutdown flag was raised during the run.
    pub interrupted: bool,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStatistics {
    /// Empty statistics starting now.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            symbols_processed: 0,
            symbols_completed: Vec::new(),
            symbols_failed: Vec::new(),
            symbols_skipped: Vec::new(),
            total_bars_downloaded: 0,
            bars_rejected: 0,
            errors: 0,
            interrupted: false,
        }
    }

    /// Folds one finished symbol into the totals.
    pub fn record(&mut self, report: &SymbolReport) {
        self.symbols_processed += 1;
        if report.success {
            self.symbols_completed.push(report.symbol.clone());
        } else {
            self.symbols_failed.push(report.symbol.clone());
        }
        self.total_bars_downloaded += report.bars_saved;
        self.bars_rejected += report.bars_rejected;
        self.errors += report.errors;
    }

    /// A symbol whose task died before producing a report.
    pub fn record_crash(&mut self, symbol: &str) {
        self.symbols_processed += 1;
        self.symbols_failed.push(symbol.to_string());
        self.errors += 1;
    }

    /// A symbol not started because of a shutdown request.
    pub fn record_skipped(&mut self, symbol: &str) {
        self.symbols_skipped.push(symbol.to_string());
        self.interrupted = true;
    }

    /// Stamps `finished_at`.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall time of the run; up to now if it has not finished.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }

    /// End-of-run report.
    pub fn log_summary(&self) {
        let secs = self.duration().num_milliseconds() as f64 / 1000.0;
        info!(
            processed = self.symbols_processed,
            completed = self.symbols_completed.len(),
            failed = self.symbols_failed.len(),
            bars = self.total_bars_downloaded,
            rejected = self.bars_rejected,
            errors = self.errors,
            duration_secs = secs,
            "Run finished"
        );
        if !self.symbols_failed.is_empty() {
            warn!(symbols = ?self.symbols_failed, "Failed symbols");
        }
        if self.interrupted {
            warn!(
                skipped = self.symbols_skipped.len(),
                "Run was interrupted before every symbol started"
            );
        }
    }
}
