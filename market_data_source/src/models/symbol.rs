use serde::Deserialize;

/// Instrument metadata as listed by the terminal. Only `name` is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawSymbolInfo {
    pub name: String,
    pub description: Option<String>,
    pub currency_base: Option<String>,
    pub currency_profit: Option<String>,
    pub currency_margin: Option<String>,
    pub digits: Option<i32>,
    pub point: Option<f64>,
    pub trade_mode: Option<i32>,
    pub trade_execution: Option<i32>,
    pub swap_mode: Option<i32>,
}

impl RawSymbolInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
