//! Builds a local SQLite history of terminal OHLCV bars.
//!
//! The pipeline classifies instruments ([`classify`]), fetches bars per symbol
//! and timeframe from a [`MarketDataSource`] ([`orchestrator`]), validates each
//! record ([`sanitize`]) and writes them idempotently ([`store`]). [`pipeline`]
//! ties one run together.
//!
//! [`MarketDataSource`]: market_data_source::providers::MarketDataSource

#![deny(missing_docs)]

pub mod classify;
pub mod config;
pub mod db;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod sanitize;
/// Diesel table definitions.
#[allow(missing_docs)]
pub mod schema;
pub mod stats;
pub mod store;
pub mod symbols;
pub mod telemetry;
pub mod tz;
