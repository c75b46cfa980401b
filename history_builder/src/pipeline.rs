//! One complete run: open the store, pick symbols, download, report, clean up.

use std::{path::Path, sync::Arc};

use market_data_source::providers::{MarketDataSource, SourceError, snapshot::SnapshotSource};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};

use crate::{
    config::BuilderConfig,
    orchestrator::DownloadOrchestrator,
    stats::RunStatistics,
    store::{BarStore, SqliteStore, StoreError},
    symbols::resolve_symbols,
};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The database could not be opened or migrated.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The terminal could not be reached before the run started.
    #[error("market data source unavailable: {0}")]
    Source(#[from] SourceError),
    /// Nothing to download after symbol resolution.
    #[error("no symbols to download")]
    NoSymbols,
    /// The config lists no timeframes.
    #[error("no timeframes configured")]
    NoTimeframes,
}

/// Opens the terminal export at `source_dir` and runs [`build_database`] against it.
pub async fn build_from_snapshot(
    config: &BuilderConfig,
    source_dir: &Path,
    shutdown: Option<watch::Receiver<bool>>,
) -> Result<RunStatistics, BuildError> {
    let source = SnapshotSource::open(source_dir).await.map_err(|e| {
        error!(error = %e, "Could not open terminal export");
        e
    })?;
    build_database(config, Arc::new(source), shutdown).await
}

/// Runs the whole pipeline against an already-connected source.
///
/// `source.shutdown()` is awaited on every path, including fatal errors.
pub async fn build_database(
    config: &BuilderConfig,
    source: Arc<dyn MarketDataSource>,
    shutdown: Option<watch::Receiver<bool>>,
) -> Result<RunStatistics, BuildError> {
    let result = run(config, Arc::clone(&source), shutdown).await;
    source.shutdown().await;
    if let Err(e) = &result {
        error!(error = %e, "Run aborted");
    }
    result
}

async fn run(
    config: &BuilderConfig,
    source: Arc<dyn MarketDataSource>,
    shutdown: Option<watch::Receiver<bool>>,
) -> Result<RunStatistics, BuildError> {
    if config.timeframes.is_empty() {
        return Err(BuildError::NoTimeframes);
    }

    let db_path = config.database_path.to_string_lossy().into_owned();
    let sqlite = Arc::new(
        tokio::task::spawn_blocking(move || SqliteStore::open(&db_path))
            .await
            .map_err(StoreError::from)??,
    );
    let store: Arc<dyn BarStore> = sqlite.clone();

    let symbols = resolve_symbols(config, source.as_ref(), Arc::clone(&store)).await;
    if symbols.is_empty() {
        return Err(BuildError::NoSymbols);
    }

    let mut orchestrator = DownloadOrchestrator::new(source, store)
        .with_request_pause(config.request_pause());
    if let Some(rx) = shutdown {
        orchestrator = orchestrator.with_shutdown(rx);
    }

    let stats = orchestrator
        .run(
            &symbols,
            &config.timeframes,
            config.max_bars_per_request,
            config.max_workers,
        )
        .await;
    stats.log_summary();

    let summary = tokio::task::spawn_blocking(move || sqlite.summary())
        .await
        .map_err(StoreError::from)?;
    match summary {
        Ok(s) => info!(
            total_bars = s.total_bars,
            symbols = s.symbols,
            timeframes = s.timeframes,
            "Database totals"
        ),
        Err(e) => error!(error = %e, "Could not read database totals"),
    }

    Ok(stats)
}
