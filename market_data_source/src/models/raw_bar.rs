//! Bar records exactly as a terminal hands them over.
//!
//! Nothing here is validated. Every field is optional and may carry a number,
//! a string, or something unusable; deciding what survives is the consumer's
//! job.

use serde::{Deserialize, de::IgnoredAny};

/// One loosely-typed field value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Int(i64),
    Float(f64),
    Text(String),
    /// Booleans, arrays, objects: present but meaningless for a bar.
    Unsupported(IgnoredAny),
}

impl RawField {
    /// Numeric view of the field. Strings are parsed, NaN and infinities pass
    /// through untouched so callers can reject them explicitly.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawField::Int(v) => Some(*v as f64),
            RawField::Float(v) => Some(*v),
            RawField::Text(s) => s.trim().parse::<f64>().ok(),
            RawField::Unsupported(_) => None,
        }
    }

    /// Integer view of the field, truncating finite fractional values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawField::Int(v) => Some(*v),
            RawField::Float(v) => float_to_i64(*v),
            RawField::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
            }
            RawField::Unsupported(_) => None,
        }
    }
}

fn float_to_i64(v: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    if v.is_finite() && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v.trunc() as i64)
    } else {
        None
    }
}

impl From<i64> for RawField {
    fn from(v: i64) -> Self {
        RawField::Int(v)
    }
}

impl From<f64> for RawField {
    fn from(v: f64) -> Self {
        RawField::Float(v)
    }
}

impl From<&str> for RawField {
    fn from(v: &str) -> Self {
        RawField::Text(v.to_string())
    }
}

/// One OHLCV row from the terminal, using the terminal's field names.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawBar {
    pub time: Option<RawField>,
    pub open: Option<RawField>,
    pub high: Option<RawField>,
    pub low: Option<RawField>,
    pub close: Option<RawField>,
    pub tick_volume: Option<RawField>,
    pub spread: Option<RawField>,
    pub real_volume: Option<RawField>,
}

impl RawBar {
    /// A fully-populated, well-formed record.
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, tick_volume: i64) -> Self {
        Self {
            time: Some(time.into()),
            open: Some(open.into()),
            high: Some(high.into()),
            low: Some(low.into()),
            close: Some(close.into()),
            tick_volume: Some(tick_volume.into()),
            spread: Some(0_i64.into()),
            real_volume: Some(0_i64.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mixed_field_types() {
        let bar: RawBar = serde_json::from_str(
            r#"{"time": "1700000000", "open": 1.1, "high": 2, "low": null, "close": true}"#,
        )
        .unwrap();

        assert_eq!(bar.time, Some(RawField::Text("1700000000".into())));
        assert_eq!(bar.open, Some(RawField::Float(1.1)));
        assert_eq!(bar.high, Some(RawField::Int(2)));
        assert_eq!(bar.low, None);
        assert!(matches!(bar.close, Some(RawField::Unsupported(_))));
        assert_eq!(bar.tick_volume, None);
    }

    #[test]
    fn numeric_views() {
        assert_eq!(RawField::from("  42 ").as_i64(), Some(42));
        assert_eq!(RawField::from("42.9").as_i64(), Some(42));
        assert_eq!(RawField::from(7.75).as_i64(), Some(7));
        assert_eq!(RawField::from(f64::NAN).as_i64(), None);
        assert_eq!(RawField::from("abc").as_f64(), None);
        assert_eq!(RawField::from(3_i64).as_f64(), Some(3.0));
        assert!(RawField::from(f64::INFINITY).as_f64().unwrap().is_infinite());
    }
}
