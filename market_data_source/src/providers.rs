//! Market data source abstraction.
//!
//! This module defines the [`MarketDataSource`] trait, the interface the ingestion
//! pipeline uses to talk to an already-connected trading terminal: enumerate
//! instruments, check that an instrument can be selected, and pull its most
//! recent bars for a [`Timeframe`].
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`Arc<dyn MarketDataSource>`) so the pipeline can be driven by any terminal
//! bridge, or by a scripted stub in tests.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_source::models::{raw_bar::RawBar, symbol::RawSymbolInfo, timeframe::Timeframe};
//! use market_data_source::providers::{MarketDataSource, SourceError};
//!
//! struct EmptyTerminal;
//!
//! #[async_trait]
//! impl MarketDataSource for EmptyTerminal {
//!     async fn list_symbols(&self) -> Result<Vec<RawSymbolInfo>, SourceError> {
//!         Ok(vec![])
//!     }
//!
//!     async fn is_selectable(&self, _symbol: &str) -> Result<bool, SourceError> {
//!         Ok(false)
//!     }
//!
//!     async fn fetch_bars(
//!         &self,
//!         _symbol: &str,
//!         _timeframe: Timeframe,
//!         _from_position: usize,
//!         _count: usize,
//!     ) -> Result<Vec<RawBar>, SourceError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod snapshot;

use std::path::PathBuf;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::{raw_bar::RawBar, symbol::RawSymbolInfo, timeframe::Timeframe};

/// A connected terminal that can enumerate instruments and serve historical bars.
///
/// Implementations must be safe to call from several tasks at once; any
/// rate limiting or request timeouts are the implementation's concern.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Every instrument the terminal knows about.
    async fn list_symbols(&self) -> Result<Vec<RawSymbolInfo>, SourceError>;

    /// Whether `symbol` can be selected for data requests right now.
    async fn is_selectable(&self, symbol: &str) -> Result<bool, SourceError>;

    /// Fetches up to `count` bars ending `from_position` bars before the most
    /// recent one (`0` = up to and including the current bar), oldest first.
    ///
    /// An empty vector means the terminal had nothing for this request.
    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        from_position: usize,
        count: usize,
    ) -> Result<Vec<RawBar>, SourceError>;

    /// Releases the terminal connection. Called once, after the last request.
    async fn shutdown(&self) {}
}

/// Errors that can occur within a [`MarketDataSource`] implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Reading terminal data from disk failed.
    #[snafu(display("Failed to read {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The terminal handed back a payload that could not be decoded.
    #[snafu(display("Failed to decode {}: {source}", path.display()))]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    /// The symbol cannot name a file inside the export directory.
    #[snafu(display("Invalid symbol name {symbol:?}"))]
    InvalidSymbol {
        symbol: String,
        backtrace: Backtrace,
    },

    /// The terminal reported an error for this request.
    #[snafu(display("Terminal error: {message}"))]
    Terminal {
        message: String,
        backtrace: Backtrace,
    },

    /// The connection was lost or never established.
    #[snafu(display("Terminal not connected: {message}"))]
    Disconnected {
        message: String,
        backtrace: Backtrace,
    },
}
