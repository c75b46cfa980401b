//! Durable, idempotent storage for bars, symbol metadata and download audits.
//!
//! [`BarStore`] is the write surface the orchestrator depends on; the SQLite
//! implementation lives in [`sqlite`].
//!
//! Thread-safety contract: implementations are shared as `Arc<dyn BarStore>`
//! across worker tasks and must serialize their own writes. Calls may block and
//! are made from blocking threads, never directly on the async runtime.

use chrono::{DateTime, NaiveDateTime, Utc};
use market_data_source::models::{symbol::RawSymbolInfo, timeframe::Timeframe};

use crate::{
    classify::{Category, classify},
    models::PriceBar,
};

pub mod sqlite;

pub use sqlite::SqliteStore;

#[derive(thiserror::Error, Debug)]
/// Errors raised by a [`BarStore`].
pub enum StoreError {
    /// The database file could not be opened.
    #[error("failed to open database {path}: {source}")]
    Connect {
        /// Path or URL that was opened.
        path: String,
        /// Driver error.
        #[source]
        source: diesel::ConnectionError,
    },

    /// Schema migrations failed.
    #[error("failed to apply migrations: {0}")]
    Migration(String),

    /// A statement failed.
    #[error(transparent)]
    Query(#[from] diesel::result::Error),

    /// A stored timeframe tag no longer parses.
    #[error(transparent)]
    Timeframe(#[from] market_data_source::models::timeframe::TimeframeError),

    /// A thread panicked while holding the connection.
    #[error("database connection lock poisoned")]
    Poisoned,

    /// The blocking thread running a store call panicked or was cancelled.
    #[error("store task did not complete: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

/// Result type used by every store operation.
pub type StoreResult<T> = Result<T, StoreError>;

/// Descriptive metadata for one instrument. One row per symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    /// Primary key.
    pub symbol: String,
    /// Human-readable name.
    pub description: Option<String>,
    /// Base currency.
    pub currency_base: Option<String>,
    /// Currency profits are booked in.
    pub currency_profit: Option<String>,
    /// Currency margin is held in.
    pub currency_margin: Option<String>,
    /// Decimal places in a quote.
    pub digits: Option<i32>,
    /// Size of one point.
    pub point: Option<f64>,
    /// Terminal trade-mode code.
    pub trade_mode: Option<i32>,
    /// Terminal execution-mode code.
    pub trade_execution: Option<i32>,
    /// Terminal swap-mode code.
    pub swap_mode: Option<i32>,
    /// Output of [`classify`].
    pub category: Category,
    /// Set by the store on every upsert.
    pub last_update: Option<NaiveDateTime>,
}

impl From<&RawSymbolInfo> for SymbolInfo {
    fn from(raw: &RawSymbolInfo) -> Self {
        Self {
            symbol: raw.name.clone(),
            description: raw.description.clone(),
            currency_base: raw.currency_base.clone(),
            currency_profit: raw.currency_profit.clone(),
            currency_margin: raw.currency_margin.clone(),
            digits: raw.digits,
            point: raw.point,
            trade_mode: raw.trade_mode,
            trade_execution: raw.trade_execution,
            swap_mode: raw.swap_mode,
            category: classify(&raw.name),
            last_update: None,
        }
    }
}

/// Audit record of one `(symbol, timeframe)` fetch attempt. Append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadStat {
    /// Ticker fetched.
    pub symbol: String,
    /// Timeframe fetched.
    pub timeframe: Timeframe,
    /// Accepted bars for this attempt (0 on failure).
    pub bars_count: usize,
    /// Oldest accepted bar.
    pub first_time: Option<DateTime<Utc>>,
    /// Newest accepted bar.
    pub last_time: Option<DateTime<Utc>>,
    /// At least one bar was accepted and written.
    pub success: bool,
    /// Filled in by the store.
    pub recorded_at: Option<NaiveDateTime>,
}

impl DownloadStat {
    /// A successful attempt covering `bars`, which are oldest first.
    pub fn succeeded(symbol: &str, timeframe: Timeframe, bars: &[PriceBar]) -> Self {
        let bounds = |bar: Option<&PriceBar>| bar.and_then(|b| crate::tz::epoch_to_utc(b.time));
        Self {
            symbol: symbol.to_string(),
            timeframe,
            bars_count: bars.len(),
            first_time: bounds(bars.iter().min_by_key(|b| b.time)),
            last_time: bounds(bars.iter().max_by_key(|b| b.time)),
            success: true,
            recorded_at: None,
        }
    }

    /// A failed attempt: no bars, no time range.
    pub fn failed(symbol: &str, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            bars_count: 0,
            first_time: None,
            last_time: None,
            success: false,
            recorded_at: None,
        }
    }
}

/// Database totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    /// Rows in `price_data`.
    pub total_bars: i64,
    /// Distinct symbols with at least one bar.
    pub symbols: i64,
    /// Distinct timeframes with at least one bar.
    pub timeframes: i64,
}

/// Portable write surface, SQLite implementation lives in [`sqlite`].
pub trait BarStore: Send + Sync {
    /// Inserts or wholesale-replaces the row for `info.symbol`.
    fn upsert_symbol_info(&self, info: &SymbolInfo) -> StoreResult<()>;

    /// Writes `bars` idempotently and returns how many rows were newly inserted.
    ///
    /// Rows whose `(symbol, timeframe, time)` already exists are skipped. If the
    /// batch as a whole fails, rows are retried one by one and individual
    /// failures are logged and skipped.
    fn write_bars(&self, symbol: &str, timeframe: Timeframe, bars: &[PriceBar])
    -> StoreResult<usize>;

    /// Appends an audit row. Never deduplicated.
    fn append_download_stat(&self, stat: &DownloadStat) -> StoreResult<()>;
}
