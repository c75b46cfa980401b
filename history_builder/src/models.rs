//! Diesel row types for the tables in [`crate::schema`].
//!
//! Insertable rows borrow from the domain values in [`crate::store`] and
//! [`PriceBar`]; queryable rows are converted back on read.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use market_data_source::models::timeframe::Timeframe;

use crate::schema::{download_stats, price_data, symbol_info};

/// One validated OHLCV observation, identified by `(symbol, timeframe, time)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    /// Instrument ticker, at most [`crate::sanitize::MAX_SYMBOL_LEN`] characters.
    pub symbol: String,
    /// Sampling granularity.
    pub timeframe: Timeframe,
    /// Bar open time, epoch seconds UTC.
    pub time: i64,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume; the terminal reports tick volume here.
    pub volume: i64,
    /// Number of ticks in the bar.
    pub tick_volume: i64,
    /// Spread in points.
    pub spread: i64,
    /// Exchange volume, 0 when the venue does not report it.
    pub real_volume: i64,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = price_data)]
pub(crate) struct NewPriceRow<'a> {
    pub symbol: &'a str,
    pub timeframe: &'static str,
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub tick_volume: i64,
    pub spread: i64,
    pub real_volume: i64,
}

impl<'a> NewPriceRow<'a> {
    /// Row for `bar` stored under `(symbol, timeframe)`, whatever key the bar carries.
    pub(crate) fn keyed(symbol: &'a str, timeframe: Timeframe, bar: &PriceBar) -> Self {
        Self {
            symbol,
            timeframe: timeframe.as_str(),
            time: bar.time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            tick_volume: bar.tick_volume,
            spread: bar.spread,
            real_volume: bar.real_volume,
        }
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = price_data, check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct PriceRow {
    pub symbol: String,
    pub timeframe: String,
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub tick_volume: Option<i64>,
    pub spread: Option<i64>,
    pub real_volume: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = symbol_info)]
pub(crate) struct NewSymbolInfoRow<'a> {
    pub symbol: &'a str,
    pub description: Option<&'a str>,
    pub currency_base: Option<&'a str>,
    pub currency_profit: Option<&'a str>,
    pub currency_margin: Option<&'a str>,
    pub digits: Option<i32>,
    pub point: Option<f64>,
    pub trade_mode: Option<i32>,
    pub trade_execution: Option<i32>,
    pub swap_mode: Option<i32>,
    pub category: &'static str,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = symbol_info, check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct SymbolInfoRow {
    pub symbol: String,
    pub description: Option<String>,
    pub currency_base: Option<String>,
    pub currency_profit: Option<String>,
    pub currency_margin: Option<String>,
    pub digits: Option<i32>,
    pub point: Option<f64>,
    pub trade_mode: Option<i32>,
    pub trade_execution: Option<i32>,
    pub swap_mode: Option<i32>,
    pub category: Option<String>,
    pub last_update: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = download_stats)]
pub(crate) struct NewDownloadStatRow<'a> {
    pub symbol: &'a str,
    pub timeframe: &'static str,
    pub bars_count: i64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub download_date: NaiveDateTime,
    pub success: bool,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = download_stats, check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct DownloadStatRow {
    pub symbol: String,
    pub timeframe: String,
    pub bars_count: i64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub download_date: Option<NaiveDateTime>,
    pub success: Option<bool>,
}
