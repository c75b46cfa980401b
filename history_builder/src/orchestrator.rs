//! Concurrent multi-symbol, multi-timeframe download.
//!
//! One tokio task per symbol, at most `concurrency` of them running at once.
//! Inside a task timeframes are fetched strictly in order with a short pause
//! between requests, since they share one terminal connection. Each task
//! returns a [`SymbolReport`]; the coordinating task folds reports into
//! [`RunStatistics`] in completion order.

use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream::FuturesUnordered};
use indexmap::IndexSet;
use market_data_source::{models::timeframe::Timeframe, providers::MarketDataSource};
use tokio::sync::{Semaphore, watch};
use tracing::{error, info, warn};

use crate::{
    sanitize::sanitize_batch,
    stats::RunStatistics,
    store::{BarStore, DownloadStat, StoreResult},
};

/// Pause between two timeframe requests for the same symbol.
pub const DEFAULT_REQUEST_PAUSE: Duration = Duration::from_millis(100);

/// Why a whole symbol failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolFailure {
    /// The terminal refused to select the symbol, or the check itself failed.
    SymbolUnavailable,
}

/// How one `(symbol, timeframe)` attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeframeOutcome {
    /// Bars were accepted and written (possibly zero new rows after dedup).
    Saved,
    /// The terminal returned nothing.
    Empty,
    /// The fetch call failed.
    FetchFailed,
    /// Every fetched record was rejected by the sanitizer.
    AllRejected,
    /// The store call failed.
    WriteFailed,
}

/// Result of one `(symbol, timeframe)` attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeframeReport {
    /// Requested timeframe.
    pub timeframe: Timeframe,
    /// How the attempt ended.
    pub outcome: TimeframeOutcome,
    /// Records returned by the source.
    pub bars_fetched: usize,
    /// Records dropped by the sanitizer.
    pub bars_rejected: usize,
    /// Rows newly inserted by the store.
    pub bars_saved: usize,
    /// Fetch or write errors (0 or 1).
    pub errors: usize,
}

impl TimeframeReport {
    fn new(timeframe: Timeframe, outcome: TimeframeOutcome) -> Self {
        Self {
            timeframe,
            outcome,
            bars_fetched: 0,
            bars_rejected: 0,
            bars_saved: 0,
            errors: 0,
        }
    }

    /// Bars were accepted and written.
    pub fn succeeded(&self) -> bool {
        self.outcome == TimeframeOutcome::Saved
    }
}

/// Result of one symbol task.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolReport {
    /// Ticker the task ran for.
    pub symbol: String,
    /// True iff the symbol was selectable, regardless of per-timeframe results.
    pub success: bool,
    /// Newly inserted rows across every timeframe.
    pub bars_saved: usize,
    /// Sanitizer rejections across every timeframe.
    pub bars_rejected: usize,
    /// Selection, fetch and write errors.
    pub errors: usize,
    /// Set when no timeframe was attempted.
    pub failure: Option<SymbolFailure>,
    /// One entry per attempted timeframe, in request order.
    pub timeframes: Vec<TimeframeReport>,
}

impl SymbolReport {
    fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            success: false,
            bars_saved: 0,
            bars_rejected: 0,
            errors: 0,
            failure: None,
            timeframes: Vec::new(),
        }
    }

    fn absorb(&mut self, tf: TimeframeReport) {
        self.bars_saved += tf.bars_saved;
        self.bars_rejected += tf.bars_rejected;
        self.errors += tf.errors;
        self.timeframes.push(tf);
    }
}

enum SymbolOutcome {
    Done(SymbolReport),
    Skipped,
}

/// What a symbol task needs, cloned into every task.
#[derive(Clone)]
struct Worker {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn BarStore>,
    timeframes: Arc<[Timeframe]>,
    max_bars: usize,
    request_pause: Duration,
}

impl Worker {
    async fn process_symbol(&self, symbol: &str) -> SymbolReport {
        let mut report = SymbolReport::new(symbol);

        match self.source.is_selectable(symbol).await {
            Ok(true) => report.success = true,
            Ok(false) => {
                warn!(symbol, "Symbol not selectable, skipping its timeframes");
                report.failure = Some(SymbolFailure::SymbolUnavailable);
                return report;
            }
            Err(e) => {
                error!(symbol, error = %e, "Could not select symbol");
                report.errors += 1;
                report.failure = Some(SymbolFailure::SymbolUnavailable);
                return report;
            }
        }

        for (i, &timeframe) in self.timeframes.iter().enumerate() {
            if i > 0 && !self.request_pause.is_zero() {
                tokio::time::sleep(self.request_pause).await;
            }
            let tf = self.process_timeframe(symbol, timeframe).await;
            report.absorb(tf);
        }

        if !report.timeframes.is_empty() && report.timeframes.iter().all(|t| !t.succeeded()) {
            warn!(symbol, "No timeframe produced data");
        }
        report
    }

    async fn process_timeframe(&self, symbol: &str, timeframe: Timeframe) -> TimeframeReport {
        let raws = match self
            .source
            .fetch_bars(symbol, timeframe, 0, self.max_bars)
            .await
        {
            Ok(raws) => raws,
            Err(e) => {
                warn!(symbol, %timeframe, error = %e, "Fetch failed");
                let mut tf = TimeframeReport::new(timeframe, TimeframeOutcome::FetchFailed);
                tf.errors += 1;
                self.record_stat(DownloadStat::failed(symbol, timeframe)).await;
                return tf;
            }
        };

        if raws.is_empty() {
            warn!(symbol, %timeframe, "No data returned");
            self.record_stat(DownloadStat::failed(symbol, timeframe)).await;
            return TimeframeReport::new(timeframe, TimeframeOutcome::Empty);
        }

        let batch = sanitize_batch(&raws, symbol, timeframe);
        let mut tf = TimeframeReport::new(timeframe, TimeframeOutcome::Saved);
        tf.bars_fetched = raws.len();
        tf.bars_rejected = batch.rejected;

        if batch.bars.is_empty() {
            warn!(symbol, %timeframe, rejected = batch.rejected, "Every bar was rejected");
            tf.outcome = TimeframeOutcome::AllRejected;
            self.record_stat(DownloadStat::failed(symbol, timeframe)).await;
            return tf;
        }

        let stat = DownloadStat::succeeded(symbol, timeframe, &batch.bars);
        let owned_symbol = symbol.to_string();
        let bars = batch.bars;
        let written = self
            .with_store(move |store| store.write_bars(&owned_symbol, timeframe, &bars))
            .await;

        match written {
            Ok(saved) => {
                info!(
                    symbol,
                    %timeframe,
                    fetched = tf.bars_fetched,
                    rejected = tf.bars_rejected,
                    saved,
                    "Timeframe stored"
                );
                tf.bars_saved = saved;
                self.record_stat(stat).await;
            }
            Err(e) => {
                error!(symbol, %timeframe, error = %e, "Could not store bars");
                tf.outcome = TimeframeOutcome::WriteFailed;
                tf.errors += 1;
                self.record_stat(DownloadStat::failed(symbol, timeframe)).await;
            }
        }
        tf
    }

    async fn record_stat(&self, stat: DownloadStat) {
        let symbol = stat.symbol.clone();
        let timeframe = stat.timeframe;
        if let Err(e) = self
            .with_store(move |store| store.append_download_stat(&stat))
            .await
        {
            warn!(symbol = %symbol, %timeframe, error = %e, "Could not record download stat");
        }
    }

    /// Runs a store call on the blocking pool.
    async fn with_store<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn BarStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref())).await?
    }
}

/// Drives one download run over a set of symbols.
pub struct DownloadOrchestrator {
    source: Arc<dyn MarketDataSource>,
    store: Arc<dyn BarStore>,
    request_pause: Duration,
    shutdown: Option<watch::Receiver<bool>>,
}

impl DownloadOrchestrator {
    /// Orchestrator with the default request pause and no shutdown flag.
    pub fn new(source: Arc<dyn MarketDataSource>, store: Arc<dyn BarStore>) -> Self {
        Self {
            source,
            store,
            request_pause: DEFAULT_REQUEST_PAUSE,
            shutdown: None,
        }
    }

    /// Sets the pause between timeframe requests of one symbol.
    pub fn with_request_pause(mut self, pause: Duration) -> Self {
        self.request_pause = pause;
        self
    }

    /// Once the flag turns `true`, symbols that have not started are skipped.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Downloads `timeframes` (in order) for every symbol, `concurrency` symbols at a time.
    ///
    /// Duplicate symbols are processed once. Never fails: every problem ends up
    /// in the returned statistics.
    pub async fn run(
        &self,
        symbols: &[String],
        timeframes: &[Timeframe],
        max_bars_per_request: usize,
        concurrency: usize,
    ) -> RunStatistics {
        let mut stats = RunStatistics::new();
        let symbols: IndexSet<&str> = symbols.iter().map(String::as_str).collect();
        let total = symbols.len();
        let concurrency = concurrency.max(1);

        info!(
            symbols = total,
            timeframes = ?timeframes,
            max_bars_per_request,
            concurrency,
            "Starting download"
        );

        let worker = Worker {
            source: Arc::clone(&self.source),
            store: Arc::clone(&self.store),
            timeframes: timeframes.into(),
            max_bars: max_bars_per_request,
            request_pause: self.request_pause,
        };
        let permits = Arc::new(Semaphore::new(concurrency));
        let mut pending = FuturesUnordered::new();

        for symbol in symbols {
            let symbol = symbol.to_string();
            let worker = worker.clone();
            let permits = Arc::clone(&permits);
            let shutdown = self.shutdown.clone();
            let task_symbol = symbol.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return SymbolOutcome::Skipped;
                };
                if shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
                    return SymbolOutcome::Skipped;
                }
                SymbolOutcome::Done(worker.process_symbol(&task_symbol).await)
            });
            pending.push(async move { (symbol, handle.await) });
        }

        while let Some((symbol, joined)) = pending.next().await {
            match joined {
                Ok(SymbolOutcome::Done(report)) => {
                    stats.record(&report);
                    let percent = stats.symbols_processed as f64 * 100.0 / total as f64;
                    info!(
                        symbol = %symbol,
                        success = report.success,
                        bars = report.bars_saved,
                        processed = stats.symbols_processed,
                        total,
                        percent = (percent * 10.0).round() / 10.0,
                        "Symbol finished"
                    );
                }
                Ok(SymbolOutcome::Skipped) => stats.record_skipped(&symbol),
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "Symbol task crashed");
                    stats.record_crash(&symbol);
                }
            }
        }

        if self.shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
            stats.interrupted = true;
        }
        stats.finish();
        stats
    }
}
