//! A [`MarketDataSource`] backed by a directory exported from the terminal.
//!
//! Layout:
//!
//! ```text
//! <root>/symbols.json          [{"name": "EURUSD", "digits": 5, ..., "selectable": true}, ...]
//! <root>/<SYMBOL>/<TF>.json    [{"time": 1700000000, "open": 1.1, ...}, ...]   oldest first
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use snafu::{ResultExt, ensure};
use tracing::{debug, info};

use super::{DecodeSnafu, InvalidSymbolSnafu, IoSnafu, MarketDataSource, SourceError};
use crate::models::{raw_bar::RawBar, symbol::RawSymbolInfo, timeframe::Timeframe};

const SYMBOLS_FILE: &str = "symbols.json";

#[derive(Debug, Deserialize)]
struct SnapshotSymbol {
    #[serde(flatten)]
    info: RawSymbolInfo,
    #[serde(default = "default_selectable")]
    selectable: bool,
}

fn default_selectable() -> bool {
    true
}

/// Terminal export on disk. The symbol list is read once at [`open`](Self::open);
/// bar files are read on every request.
#[derive(Debug)]
pub struct SnapshotSource {
    root: PathBuf,
    symbols: IndexMap<String, SnapshotSymbol>,
}

impl SnapshotSource {
    /// Opens an export directory. Fails if `symbols.json` is missing or malformed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let root = root.into();
        let path = root.join(SYMBOLS_FILE);
        let listed: Vec<SnapshotSymbol> = read_json(&path).await?;

        let symbols = listed
            .into_iter()
            .map(|s| (s.info.name.clone(), s))
            .collect::<IndexMap<_, _>>();

        info!(root = %root.display(), symbols = symbols.len(), "Opened terminal snapshot");
        Ok(Self { root, symbols })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bars_path(&self, symbol: &str, timeframe: Timeframe) -> Result<PathBuf, SourceError> {
        ensure!(is_plain_file_name(symbol), InvalidSymbolSnafu { symbol });
        Ok(self
            .root
            .join(symbol)
            .join(format!("{}.json", timeframe.as_str())))
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SourceError> {
    let bytes = tokio::fs::read(path).await.context(IoSnafu { path })?;
    serde_json::from_slice(&bytes).context(DecodeSnafu { path })
}

/// A single path component: no separators, not `.` or `..`.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.chars().any(|c| c == '/' || c == '\\' || std::path::is_separator(c))
}

/// Window of `count` bars ending `from_position` bars before the newest of `len`.
fn window(len: usize, from_position: usize, count: usize) -> (usize, usize) {
    let end = len - from_position.min(len);
    let start = end.saturating_sub(count);
    (start, end)
}

#[async_trait]
impl MarketDataSource for SnapshotSource {
    async fn list_symbols(&self) -> Result<Vec<RawSymbolInfo>, SourceError> {
        Ok(self.symbols.values().map(|s| s.info.clone()).collect())
    }

    async fn is_selectable(&self, symbol: &str) -> Result<bool, SourceError> {
        Ok(self.symbols.get(symbol).is_some_and(|s| s.selectable))
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        from_position: usize,
        count: usize,
    ) -> Result<Vec<RawBar>, SourceError> {
        let path = self.bars_path(symbol, timeframe)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(symbol, %timeframe, path = %path.display(), "No bar file in snapshot");
            return Ok(Vec::new());
        }

        let mut bars: Vec<RawBar> = read_json(&path).await?;
        let (start, end) = window(bars.len(), from_position, count);
        bars.truncate(end);
        bars.drain(..start);
        Ok(bars)
    }

    async fn shutdown(&self) {
        info!(root = %self.root.display(), "Closed terminal snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::{is_plain_file_name, window};

    #[test]
    fn window_counts_back_from_the_newest_bar() {
        assert_eq!(window(10, 0, 3), (7, 10));
        assert_eq!(window(10, 2, 3), (5, 8));
        assert_eq!(window(10, 0, 50), (0, 10));
        assert_eq!(window(10, 12, 3), (0, 0));
        assert_eq!(window(0, 0, 3), (0, 0));
    }

    #[test]
    fn only_single_component_symbols_map_to_files() {
        assert!(is_plain_file_name("EURUSD"));
        assert!(is_plain_file_name("US30.cash"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name("."));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../EURUSD"));
        assert!(!is_plain_file_name("EUR/USD"));
        assert!(!is_plain_file_name("EUR\\USD"));
    }
}
