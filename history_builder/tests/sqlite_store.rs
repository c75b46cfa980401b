mod common;
use common::{assert_sqlite_pragmas, price_bar, raw_conn, setup_store};

use chrono::{TimeZone, Utc};
use diesel::QueryableByName;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Text};
use history_builder::{
    classify::Category,
    models::PriceBar,
    store::{BarStore, DownloadStat, StoreSummary, SymbolInfo},
};
use market_data_source::models::{symbol::RawSymbolInfo, timeframe::Timeframe};

#[derive(QueryableByName)]
struct Name {
    #[diesel(sql_type = Text)]
    name: String,
}
#[derive(QueryableByName)]
struct Cnt {
    #[diesel(sql_type = BigInt)]
    cnt: i64,
}

fn hourly(symbol: &str, n: i64) -> Vec<PriceBar> {
    (0..n)
        .map(|i| price_bar(symbol, Timeframe::H1, 1_700_000_000 + i * 3600, 1.1))
        .collect()
}

#[test]
fn open_applies_pragmas_and_creates_schema() {
    let (db, _store) = setup_store();
    let mut conn = raw_conn(&db);
    assert_sqlite_pragmas(&mut conn);

    let mut names: Vec<String> = sql_query(
        "SELECT name FROM sqlite_master
         WHERE (type = 'table' AND name IN ('price_data', 'symbol_info', 'download_stats'))
            OR (type = 'index' AND name LIKE 'idx_%')
         ORDER BY name;",
    )
    .load::<Name>(&mut conn)
    .unwrap()
    .into_iter()
    .map(|n| n.name)
    .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "download_stats",
            "idx_symbol_time",
            "idx_symbol_timeframe_time",
            "idx_timeframe_time",
            "price_data",
            "symbol_info",
        ]
    );
}

#[test]
fn reopening_an_existing_database_keeps_data() {
    let (db, store) = setup_store();
    store
        .write_bars("EURUSD", Timeframe::H1, &hourly("EURUSD", 3))
        .unwrap();
    drop(store);

    let reopened = history_builder::store::SqliteStore::open(&db.path).unwrap();
    assert_eq!(reopened.count_bars("EURUSD", Timeframe::H1).unwrap(), 3);
}

#[test]
fn writing_the_same_bars_twice_is_idempotent() {
    let (_db, store) = setup_store();
    let bars = hourly("EURUSD", 24);

    let first = store.write_bars("EURUSD", Timeframe::H1, &bars).unwrap();
    let after_first = store.count_bars("EURUSD", Timeframe::H1).unwrap();
    let second = store.write_bars("EURUSD", Timeframe::H1, &bars).unwrap();
    let after_second = store.count_bars("EURUSD", Timeframe::H1).unwrap();

    assert_eq!(first, 24);
    assert_eq!(second, 0);
    assert_eq!(after_first, 24);
    assert_eq!(after_second, after_first);
}

#[test]
fn overlapping_batches_only_count_new_rows() {
    let (_db, store) = setup_store();
    let bars = hourly("EURUSD", 10);

    assert_eq!(store.write_bars("EURUSD", Timeframe::H1, &bars[..6]).unwrap(), 6);
    assert_eq!(store.write_bars("EURUSD", Timeframe::H1, &bars[3..]).unwrap(), 4);
    assert_eq!(store.count_bars("EURUSD", Timeframe::H1).unwrap(), 10);
}

#[test]
fn same_time_on_other_timeframe_or_symbol_is_a_different_bar() {
    let (_db, store) = setup_store();
    let t = 1_700_000_000;
    store
        .write_bars("EURUSD", Timeframe::H1, &[price_bar("EURUSD", Timeframe::H1, t, 1.1)])
        .unwrap();
    store
        .write_bars("EURUSD", Timeframe::D1, &[price_bar("EURUSD", Timeframe::D1, t, 1.1)])
        .unwrap();
    store
        .write_bars("GBPUSD", Timeframe::H1, &[price_bar("GBPUSD", Timeframe::H1, t, 1.3)])
        .unwrap();

    assert_eq!(
        store.summary().unwrap(),
        StoreSummary {
            total_bars: 3,
            symbols: 2,
            timeframes: 2,
        }
    );
}

#[test]
fn bars_are_stored_under_the_batch_key() {
    let (_db, store) = setup_store();

    let stray = [price_bar("GBPUSD", Timeframe::D1, 1_700_000_000, 1.0)];
    assert_eq!(store.write_bars("EURUSD", Timeframe::H1, &stray).unwrap(), 1);
    assert_eq!(store.count_bars("EURUSD", Timeframe::H1).unwrap(), 1);
    assert_eq!(store.count_bars("GBPUSD", Timeframe::D1).unwrap(), 0);

    let long = "X".repeat(60);
    let bars = [price_bar(&long, Timeframe::M1, 1_700_000_000, 1.0)];
    assert_eq!(store.write_bars(&long, Timeframe::M1, &bars).unwrap(), 1);
    let stored = store
        .load_bars(&long[..50], Timeframe::M1, i64::MIN, i64::MAX)
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].symbol.chars().count(), 50);
}

#[test]
fn failing_batch_falls_back_to_row_by_row_inserts() {
    let (db, store) = setup_store();

    // a constraint unrelated to the dedup key: rejects one specific price
    raw_conn(&db)
        .batch_execute(
            "CREATE TRIGGER reject_marked_close BEFORE INSERT ON price_data
             WHEN NEW.close = 1234.5
             BEGIN SELECT RAISE(ABORT, 'rejected by audit trigger'); END;",
        )
        .unwrap();

    let mut bars = hourly("EURUSD", 10);
    bars[4].close = 1234.5;

    let written = store.write_bars("EURUSD", Timeframe::H1, &bars).unwrap();
    assert_eq!(written, 9);
    assert_eq!(store.count_bars("EURUSD", Timeframe::H1).unwrap(), 9);

    let stored = store
        .load_bars("EURUSD", Timeframe::H1, i64::MIN, i64::MAX)
        .unwrap();
    assert!(stored.iter().all(|b| b.close != 1234.5));

    // fallback path is idempotent too
    assert_eq!(store.write_bars("EURUSD", Timeframe::H1, &bars).unwrap(), 0);
}

#[test]
fn symbol_info_upsert_replaces_the_row() {
    let (db, store) = setup_store();

    let mut raw = RawSymbolInfo::named("EURUSD");
    raw.description = Some("Euro vs Dollar".into());
    raw.digits = Some(5);
    raw.point = Some(0.00001);
    store.upsert_symbol_info(&SymbolInfo::from(&raw)).unwrap();

    let mut updated = RawSymbolInfo::named("EURUSD");
    updated.digits = Some(4);
    store.upsert_symbol_info(&SymbolInfo::from(&updated)).unwrap();

    let info = store.symbol_info("EURUSD").unwrap().expect("row");
    assert_eq!(info.category, Category::Forex);
    assert_eq!(info.digits, Some(4));
    // wholesale replace: fields absent from the new snapshot are cleared
    assert_eq!(info.description, None);
    assert_eq!(info.point, None);
    assert!(info.last_update.is_some());

    let cnt: Cnt = sql_query("SELECT COUNT(*) AS cnt FROM symbol_info;")
        .get_result(&mut raw_conn(&db))
        .unwrap();
    assert_eq!(cnt.cnt, 1);
    assert!(store.symbol_info("GBPUSD").unwrap().is_none());
}

#[test]
fn download_stats_are_append_only() {
    let (_db, store) = setup_store();
    let bars = hourly("EURUSD", 3);
    let ok = DownloadStat::succeeded("EURUSD", Timeframe::H1, &bars);

    store.append_download_stat(&ok).unwrap();
    store.append_download_stat(&ok).unwrap();
    store
        .append_download_stat(&DownloadStat::failed("EURUSD", Timeframe::M1))
        .unwrap();

    let stats = store.download_stats("EURUSD").unwrap();
    assert_eq!(stats.len(), 3);

    assert!(stats[0].success);
    assert_eq!(stats[0].bars_count, 3);
    assert_eq!(
        stats[0].first_time,
        Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    );
    assert_eq!(
        stats[0].last_time,
        Some(Utc.timestamp_opt(1_700_000_000 + 2 * 3600, 0).unwrap())
    );
    assert!(stats[0].recorded_at.is_some());
    assert_eq!(stats[1].bars_count, 3);

    assert!(!stats[2].success);
    assert_eq!(stats[2].timeframe, Timeframe::M1);
    assert_eq!(stats[2].bars_count, 0);
    assert_eq!(stats[2].first_time, None);
}

#[test]
fn store_is_shared_across_threads() {
    let (_db, store) = setup_store();
    let store = std::sync::Arc::new(store);

    let handles: Vec<_> = ["EURUSD", "GBPUSD", "USDJPY", "XAUUSD"]
        .into_iter()
        .map(|symbol| {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || {
                store
                    .write_bars(symbol, Timeframe::H1, &hourly(symbol, 50))
                    .unwrap()
            })
        })
        .collect();

    let written: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(written, 200);
    assert_eq!(store.summary().unwrap().total_bars, 200);
}
