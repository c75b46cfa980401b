pub mod raw_bar;
pub mod symbol;
pub mod timeframe;
