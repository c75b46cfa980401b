//! Per-record validation of terminal bars.
//!
//! [`sanitize`] turns one [`RawBar`] into a [`PriceBar`] or a [`Rejection`].
//! Rules, first failure wins:
//! 1. `time` must convert to epoch seconds (integer, float, numeric string or
//!    timestamp string), else [`Rejection::MissingTimestamp`].
//! 2. `open`, `high`, `low`, `close` must be finite and strictly positive, else
//!    [`Rejection::InvalidOhlc`] naming the field.
//! 3. Count fields never reject; see [`CountField`] for the defaults.
//! 4. The symbol is truncated to [`MAX_SYMBOL_LEN`] characters.

use std::fmt;

use market_data_source::models::{
    raw_bar::{RawBar, RawField},
    timeframe::Timeframe,
};
use thiserror::Error;
use tracing::debug;

use crate::{models::PriceBar, tz};

/// Longest symbol kept in `price_data.symbol`.
pub const MAX_SYMBOL_LEN: usize = 50;

/// Price field that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OhlcField {
    /// `open`
    Open,
    /// `high`
    High,
    /// `low`
    Low,
    /// `close`
    Close,
}

impl fmt::Display for OhlcField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OhlcField::Open => "open",
            OhlcField::High => "high",
            OhlcField::Low => "low",
            OhlcField::Close => "close",
        })
    }
}

/// Why a record was dropped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// `time` is absent or converts to no epoch.
    #[error("time is missing or not a timestamp")]
    MissingTimestamp,
    /// A price is absent, unparseable, non-finite or not positive.
    #[error("{field} is missing, non-finite or not positive")]
    InvalidOhlc {
        /// First price that failed, checked in OHLC order.
        field: OhlcField,
    },
}

/// Count fields downgraded to a default instead of rejecting the record.
///
/// | field         | source field   | default |
/// |---------------|----------------|---------|
/// | `volume`      | `tick_volume`  | 0       |
/// | `tick_volume` | `tick_volume`  | 0       |
/// | `spread`      | `spread`       | 0       |
/// | `real_volume` | `real_volume`  | 0       |
///
/// The default applies when the source value is absent, unparseable or negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountField {
    /// `PriceBar::volume`
    Volume,
    /// `PriceBar::tick_volume`
    TickVolume,
    /// `PriceBar::spread`
    Spread,
    /// `PriceBar::real_volume`
    RealVolume,
}

impl CountField {
    /// Every defaulted field, in column order.
    pub const ALL: [CountField; 4] = [
        CountField::Volume,
        CountField::TickVolume,
        CountField::Spread,
        CountField::RealVolume,
    ];

    /// Value stored when the source value is unusable.
    pub const fn default_value(self) -> i64 {
        match self {
            CountField::Volume
            | CountField::TickVolume
            | CountField::Spread
            | CountField::RealVolume => 0,
        }
    }

    fn source(self, raw: &RawBar) -> Option<&RawField> {
        match self {
            CountField::Volume | CountField::TickVolume => raw.tick_volume.as_ref(),
            CountField::Spread => raw.spread.as_ref(),
            CountField::RealVolume => raw.real_volume.as_ref(),
        }
    }

    fn read(self, raw: &RawBar) -> i64 {
        self.source(raw)
            .and_then(RawField::as_i64)
            .filter(|v| *v >= 0)
            .unwrap_or(self.default_value())
    }
}

/// Validates one record for `symbol` at `timeframe`.
pub fn sanitize(raw: &RawBar, symbol: &str, timeframe: Timeframe) -> Result<PriceBar, Rejection> {
    let time = raw
        .time
        .as_ref()
        .and_then(epoch_seconds)
        .ok_or(Rejection::MissingTimestamp)?;

    let open = price(raw.open.as_ref(), OhlcField::Open)?;
    let high = price(raw.high.as_ref(), OhlcField::High)?;
    let low = price(raw.low.as_ref(), OhlcField::Low)?;
    let close = price(raw.close.as_ref(), OhlcField::Close)?;

    Ok(PriceBar {
        symbol: truncate_symbol(symbol).to_string(),
        timeframe,
        time,
        open,
        high,
        low,
        close,
        volume: CountField::Volume.read(raw),
        tick_volume: CountField::TickVolume.read(raw),
        spread: CountField::Spread.read(raw),
        real_volume: CountField::RealVolume.read(raw),
    })
}

fn epoch_seconds(field: &RawField) -> Option<i64> {
    match field {
        RawField::Text(s) => field
            .as_i64()
            .or_else(|| tz::parse_timestamp(s).map(|dt| dt.timestamp())),
        _ => field.as_i64(),
    }
}

fn price(field: Option<&RawField>, which: OhlcField) -> Result<f64, Rejection> {
    field
        .and_then(RawField::as_f64)
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or(Rejection::InvalidOhlc { field: which })
}

/// `symbol` cut to at most [`MAX_SYMBOL_LEN`] characters.
pub fn truncate_symbol(symbol: &str) -> &str {
    match symbol.char_indices().nth(MAX_SYMBOL_LEN) {
        Some((end, _)) => &symbol[..end],
        None => symbol,
    }
}

/// Outcome of sanitizing one fetched batch.
#[derive(Debug, Default)]
pub struct SanitizedBatch {
    /// Accepted bars, in source order.
    pub bars: Vec<PriceBar>,
    /// Number of records dropped.
    pub rejected: usize,
}

/// Sanitizes every record, keeping the accepted ones in source order.
pub fn sanitize_batch(raws: &[RawBar], symbol: &str, timeframe: Timeframe) -> SanitizedBatch {
    let mut batch = SanitizedBatch {
        bars: Vec::with_capacity(raws.len()),
        rejected: 0,
    };
    for (index, raw) in raws.iter().enumerate() {
        match sanitize(raw, symbol, timeframe) {
            Ok(bar) => batch.bars.push(bar),
            Err(reason) => {
                debug!(symbol, %timeframe, index, %reason, "Rejected bar");
                batch.rejected += 1;
            }
        }
    }
    batch
}
