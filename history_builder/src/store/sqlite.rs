//! SQLite-backed [`BarStore`].
//!
//! One connection guarded by a mutex: SQLite allows a single writer, so every
//! call takes the lock for its whole duration.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use diesel::prelude::*;
use market_data_source::models::timeframe::Timeframe;
use tracing::{debug, info, warn};

use super::{BarStore, DownloadStat, StoreError, StoreResult, StoreSummary, SymbolInfo};
use crate::{
    db::{connection::connect_sqlite, migrate},
    models::{
        DownloadStatRow, NewDownloadStatRow, NewPriceRow, NewSymbolInfoRow, PriceBar, PriceRow,
        SymbolInfoRow,
    },
    sanitize::truncate_symbol,
    schema::{download_stats, price_data, symbol_info},
    tz,
};

/// Rows per multi-row INSERT; 2000 x 11 columns stays under SQLite's bound parameter limit.
const INSERT_CHUNK: usize = 2000;

/// Time-series store over a single SQLite file.
pub struct SqliteStore {
    conn: Mutex<SqliteConnection>,
    path: String,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies pending migrations.
    pub fn open(path: &str) -> StoreResult<Self> {
        let mut conn = connect_sqlite(path)?;
        migrate::run_pending(&mut conn)?;
        info!(path, "Database ready");
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_string(),
        })
    }

    /// Path the store was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, SqliteConnection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of stored bars for `(symbol, timeframe)`.
    pub fn count_bars(&self, symbol: &str, timeframe: Timeframe) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        let n = price_data::table
            .filter(price_data::symbol.eq(symbol))
            .filter(price_data::timeframe.eq(timeframe.as_str()))
            .count()
            .get_result(&mut *conn)?;
        Ok(n)
    }

    /// Bars for `(symbol, timeframe)` with `from <= time <= to`, oldest first.
    pub fn load_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        from: i64,
        to: i64,
    ) -> StoreResult<Vec<PriceBar>> {
        let mut conn = self.conn()?;
        let rows: Vec<PriceRow> = price_data::table
            .filter(price_data::symbol.eq(symbol))
            .filter(price_data::timeframe.eq(timeframe.as_str()))
            .filter(price_data::time.between(from, to))
            .order(price_data::time.asc())
            .select(PriceRow::as_select())
            .load(&mut *conn)?;

        rows.into_iter()
            .map(|r| -> StoreResult<PriceBar> {
                Ok(PriceBar {
                    timeframe: r.timeframe.parse()?,
                    symbol: r.symbol,
                    time: r.time,
                    open: r.open,
                    high: r.high,
                    low: r.low,
                    close: r.close,
                    volume: r.volume,
                    tick_volume: r.tick_volume.unwrap_or(0),
                    spread: r.spread.unwrap_or(0),
                    real_volume: r.real_volume.unwrap_or(0),
                })
            })
            .collect()
    }

    /// Every audit row for `symbol`, in insertion order.
    pub fn download_stats(&self, symbol: &str) -> StoreResult<Vec<DownloadStat>> {
        let mut conn = self.conn()?;
        let rows: Vec<DownloadStatRow> = download_stats::table
            .filter(download_stats::symbol.eq(symbol))
            .order(download_stats::id.asc())
            .select(DownloadStatRow::as_select())
            .load(&mut *conn)?;

        rows.into_iter()
            .map(|r| -> StoreResult<DownloadStat> {
                Ok(DownloadStat {
                    timeframe: r.timeframe.parse()?,
                    symbol: r.symbol,
                    bars_count: usize::try_from(r.bars_count).unwrap_or(0),
                    first_time: r.first_date.as_deref().and_then(tz::parse_timestamp),
                    last_time: r.last_date.as_deref().and_then(tz::parse_timestamp),
                    success: r.success.unwrap_or(true),
                    recorded_at: r.download_date,
                })
            })
            .collect()
    }

    /// Stored metadata for `symbol`, if any.
    pub fn symbol_info(&self, symbol: &str) -> StoreResult<Option<SymbolInfo>> {
        let mut conn = self.conn()?;
        let row: Option<SymbolInfoRow> = symbol_info::table
            .find(symbol)
            .select(SymbolInfoRow::as_select())
            .first(&mut *conn)
            .optional()?;

        Ok(row.map(|r| SymbolInfo {
            category: r
                .category
                .as_deref()
                .and_then(|c| c.parse().ok())
                .unwrap_or(crate::classify::Category::Other),
            symbol: r.symbol,
            description: r.description,
            currency_base: r.currency_base,
            currency_profit: r.currency_profit,
            currency_margin: r.currency_margin,
            digits: r.digits,
            point: r.point,
            trade_mode: r.trade_mode,
            trade_execution: r.trade_execution,
            swap_mode: r.swap_mode,
            last_update: r.last_update,
        }))
    }

    /// Totals across the whole `price_data` table.
    pub fn summary(&self) -> StoreResult<StoreSummary> {
        let mut conn = self.conn()?;
        let total_bars = price_data::table.count().get_result(&mut *conn)?;
        let symbols = price_data::table
            .select(diesel::dsl::count_distinct(price_data::symbol))
            .get_result(&mut *conn)?;
        let timeframes = price_data::table
            .select(diesel::dsl::count_distinct(price_data::timeframe))
            .get_result(&mut *conn)?;
        Ok(StoreSummary {
            total_bars,
            symbols,
            timeframes,
        })
    }
}

fn insert_batch(conn: &mut SqliteConnection, rows: &[NewPriceRow<'_>]) -> QueryResult<usize> {
    conn.immediate_transaction(|conn| {
        let mut inserted = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            inserted += diesel::insert_or_ignore_into(price_data::table)
                .values(chunk)
                .execute(conn)?;
        }
        Ok(inserted)
    })
}

fn insert_one_by_one(
    conn: &mut SqliteConnection,
    symbol: &str,
    timeframe: Timeframe,
    rows: &[NewPriceRow<'_>],
) -> usize {
    let mut inserted = 0;
    for row in rows {
        match diesel::insert_or_ignore_into(price_data::table)
            .values(row)
            .execute(conn)
        {
            Ok(n) => inserted += n,
            Err(e) => warn!(symbol, %timeframe, time = row.time, error = %e, "Dropped bar on insert"),
        }
    }
    inserted
}

impl BarStore for SqliteStore {
    fn upsert_symbol_info(&self, info: &SymbolInfo) -> StoreResult<()> {
        let row = NewSymbolInfoRow {
            symbol: &info.symbol,
            description: info.description.as_deref(),
            currency_base: info.currency_base.as_deref(),
            currency_profit: info.currency_profit.as_deref(),
            currency_margin: info.currency_margin.as_deref(),
            digits: info.digits,
            point: info.point,
            trade_mode: info.trade_mode,
            trade_execution: info.trade_execution,
            swap_mode: info.swap_mode,
            category: info.category.as_str(),
            last_update: Utc::now().naive_utc(),
        };

        let mut conn = self.conn()?;
        diesel::replace_into(symbol_info::table)
            .values(&row)
            .execute(&mut *conn)?;
        Ok(())
    }

    fn write_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: &[PriceBar],
    ) -> StoreResult<usize> {
        if bars.is_empty() {
            return Ok(0);
        }
        let key = truncate_symbol(symbol);
        let rekeyed = bars
            .iter()
            .filter(|b| b.symbol != key || b.timeframe != timeframe)
            .count();
        if rekeyed > 0 {
            warn!(symbol, %timeframe, rekeyed, "Bars carried another key, storing under the batch key");
        }
        let rows: Vec<NewPriceRow<'_>> = bars
            .iter()
            .map(|bar| NewPriceRow::keyed(key, timeframe, bar))
            .collect();

        let mut conn = self.conn()?;
        match insert_batch(&mut conn, &rows) {
            Ok(inserted) => {
                debug!(symbol, %timeframe, offered = rows.len(), inserted, "Batch insert");
                Ok(inserted)
            }
            Err(e) => {
                warn!(symbol, %timeframe, error = %e, "Batch insert failed, inserting row by row");
                let inserted = insert_one_by_one(&mut conn, symbol, timeframe, &rows);
                info!(symbol, %timeframe, offered = rows.len(), inserted, "Row-by-row insert finished");
                Ok(inserted)
            }
        }
    }

    fn append_download_stat(&self, stat: &DownloadStat) -> StoreResult<()> {
        let row = NewDownloadStatRow {
            symbol: &stat.symbol,
            timeframe: stat.timeframe.as_str(),
            bars_count: i64::try_from(stat.bars_count).unwrap_or(i64::MAX),
            first_date: stat.first_time.map(tz::to_rfc3339_secs),
            last_date: stat.last_time.map(tz::to_rfc3339_secs),
            download_date: Utc::now().naive_utc(),
            success: stat.success,
        };

        let mut conn = self.conn()?;
        diesel::insert_into(download_stats::table)
            .values(&row)
            .execute(&mut *conn)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time: i64, close: f64) -> PriceBar {
        PriceBar {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::H1,
            time,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close,
            volume: 10,
            tick_volume: 10,
            spread: 1,
            real_volume: 0,
        }
    }

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bars.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        (dir, store)
    }

    #[test]
    fn empty_batch_writes_nothing() {
        let (_dir, store) = temp_store();
        assert_eq!(store.write_bars("EURUSD", Timeframe::H1, &[]).unwrap(), 0);
        assert_eq!(store.summary().unwrap(), StoreSummary::default());
    }

    #[test]
    fn batches_larger_than_one_chunk() {
        let (_dir, store) = temp_store();
        let bars: Vec<PriceBar> = (0..(INSERT_CHUNK as i64 + 5)).map(|t| bar(t, 1.0)).collect();
        let n = store.write_bars("EURUSD", Timeframe::H1, &bars).unwrap();
        assert_eq!(n, INSERT_CHUNK + 5);
        assert_eq!(
            store.count_bars("EURUSD", Timeframe::H1).unwrap(),
            INSERT_CHUNK as i64 + 5
        );
    }

    #[test]
    fn duplicates_inside_a_batch_are_not_counted() {
        let (_dir, store) = temp_store();
        let bars = vec![bar(1, 1.0), bar(1, 2.0), bar(2, 1.0)];
        assert_eq!(store.write_bars("EURUSD", Timeframe::H1, &bars).unwrap(), 2);
        // first write wins, later duplicates never overwrite
        let stored = store.load_bars("EURUSD", Timeframe::H1, 0, 10).unwrap();
        assert_eq!(stored[0].close, 1.0);
    }

    #[test]
    fn load_bars_filters_by_range() {
        let (_dir, store) = temp_store();
        let bars: Vec<PriceBar> = (0..10).map(|t| bar(t * 60, 1.0)).collect();
        store.write_bars("EURUSD", Timeframe::H1, &bars).unwrap();

        let got = store.load_bars("EURUSD", Timeframe::H1, 120, 300).unwrap();
        let times: Vec<i64> = got.iter().map(|b| b.time).collect();
        assert_eq!(times, vec![120, 180, 240, 300]);
        assert_eq!(got[0], bar(120, 1.0));
    }
}
