//! Instrument categorization from the ticker alone.
//!
//! Rules are checked in a fixed priority order and the first hit wins:
//! 1. INDEX: ticker contains an index keyword (`US30`, `NAS100`, ...).
//! 2. FOREX: ticker is exactly six characters, either three-letter leg is a
//!    major currency (`EURUSD`, `SGDJPY`) and neither leg is a metal or crypto
//!    code (`XAUUSD`, `BTCUSD` fall through to the later rules).
//! 3. COMMODITY: ticker contains a commodity keyword (`XAU`, `OIL`, ...).
//! 4. CRYPTO: ticker contains a crypto keyword (`BTC`, `ETH`, ...).
//! 5. OTHER.
//!
//! Matching is case-insensitive.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

const INDEX_KEYWORDS: &[&str] = &[
    "US30", "NAS100", "SPX500", "UK100", "GER30", "FRA40", "JPN225", "AUS200", "USTEC", "VIX",
];
const FOREX_CURRENCIES: &[&str] = &["EUR", "USD", "GBP", "JPY", "CHF", "AUD", "CAD", "NZD"];
const COMMODITY_KEYWORDS: &[&str] = &["GOLD", "SILVER", "OIL", "BRENT", "XAU", "XAG", "USO"];
const CRYPTO_KEYWORDS: &[&str] = &["BTC", "ETH", "LTC", "XRP", "ADA", "DOT"];

/// Instrument category, stored upper-case in `symbol_info.category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    /// Stock indices and volatility indices.
    Index,
    /// Currency pairs.
    Forex,
    /// Metals and energy.
    Commodity,
    /// Crypto currencies.
    Crypto,
    /// Anything unmatched.
    Other,
}

impl Category {
    /// Upper-case tag, e.g. `"FOREX"`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::Index => "INDEX",
            Category::Forex => "FOREX",
            Category::Commodity => "COMMODITY",
            Category::Crypto => "CRYPTO",
            Category::Other => "OTHER",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    /// Unknown tags read back as [`Category::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "INDEX" => Category::Index,
            "FOREX" => Category::Forex,
            "COMMODITY" => Category::Commodity,
            "CRYPTO" => Category::Crypto,
            _ => Category::Other,
        })
    }
}

/// Classifies a ticker. Total: every input maps to some category.
pub fn classify(ticker: &str) -> Category {
    let ticker = ticker.to_uppercase();
    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| ticker.contains(k));

    if contains_any(INDEX_KEYWORDS) {
        Category::Index
    } else if is_currency_pair(&ticker) {
        Category::Forex
    } else if contains_any(COMMODITY_KEYWORDS) {
        Category::Commodity
    } else if contains_any(CRYPTO_KEYWORDS) {
        Category::Crypto
    } else {
        Category::Other
    }
}

fn is_currency_pair(ticker: &str) -> bool {
    if ticker.chars().count() != 6 {
        return false;
    }
    let (Some(base), Some(quote)) = (ticker.get(..3), ticker.get(3..)) else {
        return false;
    };
    let legs = [base, quote];
    let non_currency =
        |leg: &&str| COMMODITY_KEYWORDS.contains(leg) || CRYPTO_KEYWORDS.contains(leg);
    legs.iter().any(|leg| FOREX_CURRENCIES.contains(leg)) && !legs.iter().any(non_currency)
}
