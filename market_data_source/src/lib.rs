//! Terminal-facing side of the history builder: the [`MarketDataSource`]
//! contract, the records a terminal hands back, and a snapshot-directory source.
//!
//! [`MarketDataSource`]: providers::MarketDataSource

pub mod models;
pub mod providers;
