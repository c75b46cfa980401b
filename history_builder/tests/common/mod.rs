#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use history_builder::{db::connection, models::PriceBar, store::SqliteStore};
use market_data_source::{
    models::{raw_bar::RawBar, symbol::RawSymbolInfo, timeframe::Timeframe},
    providers::{MarketDataSource, SourceError, TerminalSnafu},
};
use tempfile::TempDir;
use tokio::sync::watch;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}

pub struct TestDb {
    dir: TempDir,     // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

impl TestDb {
    pub fn dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }
}

pub fn temp_db() -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("test.db").to_string_lossy().to_string();
    TestDb { dir, path }
}

/// Migrated store on a fresh temp file.
pub fn setup_store() -> (TestDb, SqliteStore) {
    let db = temp_db();
    let store = SqliteStore::open(&db.path).expect("open store");
    (db, store)
}

/// Second, independent connection to the same file.
pub fn raw_conn(db: &TestDb) -> SqliteConnection {
    connection::connect_sqlite(&db.path).expect("connect")
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn price_bar(symbol: &str, timeframe: Timeframe, time: i64, close: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        timeframe,
        time,
        open: close,
        high: close,
        low: close,
        close,
        volume: 100,
        tick_volume: 100,
        spread: 2,
        real_volume: 0,
    }
}

/// `n` well-formed hourly records starting at `start`.
pub fn raw_bars(start: i64, n: usize) -> Vec<RawBar> {
    (0..n as i64)
        .map(|i| RawBar::new(start + i * 3600, 1.10, 1.12, 1.09, 1.11, 50 + i))
        .collect()
}

/// In-memory terminal with scripted answers.
#[derive(Default)]
pub struct ScriptedSource {
    symbols: Vec<RawSymbolInfo>,
    unselectable: HashSet<String>,
    selection_errors: HashSet<String>,
    panics: HashSet<String>,
    bars: HashMap<(String, Timeframe), Vec<RawBar>>,
    fetch_errors: HashSet<(String, Timeframe)>,
    fetch_delay: Duration,
    shutdown_on_fetch: Option<watch::Sender<bool>>,
    pub fetches: Mutex<Vec<(String, Timeframe, usize)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(mut self, name: &str) -> Self {
        self.symbols.push(RawSymbolInfo::named(name));
        self
    }

    pub fn symbol_info(mut self, info: RawSymbolInfo) -> Self {
        self.symbols.push(info);
        self
    }

    pub fn unselectable(mut self, name: &str) -> Self {
        self.unselectable.insert(name.to_string());
        self.symbol(name)
    }

    pub fn selection_error(mut self, name: &str) -> Self {
        self.selection_errors.insert(name.to_string());
        self.symbol(name)
    }

    pub fn panics_on(mut self, name: &str) -> Self {
        self.panics.insert(name.to_string());
        self.symbol(name)
    }

    pub fn bars(mut self, name: &str, timeframe: Timeframe, bars: Vec<RawBar>) -> Self {
        self.bars.insert((name.to_string(), timeframe), bars);
        self
    }

    pub fn fetch_error(mut self, name: &str, timeframe: Timeframe) -> Self {
        self.fetch_errors.insert((name.to_string(), timeframe));
        self
    }

    pub fn fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Raises the run's shutdown flag as soon as any fetch starts.
    pub fn shutdown_on_fetch(mut self, flag: watch::Sender<bool>) -> Self {
        self.shutdown_on_fetch = Some(flag);
        self
    }

    pub fn fetched(&self) -> Vec<(String, Timeframe, usize)> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    async fn list_symbols(&self) -> Result<Vec<RawSymbolInfo>, SourceError> {
        Ok(self.symbols.clone())
    }

    async fn is_selectable(&self, symbol: &str) -> Result<bool, SourceError> {
        if self.panics.contains(symbol) {
            panic!("scripted terminal crash for {symbol}");
        }
        if self.selection_errors.contains(symbol) {
            return TerminalSnafu {
                message: format!("cannot select {symbol}"),
            }
            .fail();
        }
        Ok(!self.unselectable.contains(symbol))
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        from_position: usize,
        count: usize,
    ) -> Result<Vec<RawBar>, SourceError> {
        assert_eq!(from_position, 0);
        self.fetches
            .lock()
            .unwrap()
            .push((symbol.to_string(), timeframe, count));

        if let Some(flag) = &self.shutdown_on_fetch {
            flag.send_replace(true);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fetch_errors.contains(&(symbol.to_string(), timeframe)) {
            return TerminalSnafu {
                message: format!("no history for {symbol} {timeframe}"),
            }
            .fail();
        }
        let bars = self
            .bars
            .get(&(symbol.to_string(), timeframe))
            .cloned()
            .unwrap_or_default();
        Ok(bars.into_iter().rev().take(count).rev().collect())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
