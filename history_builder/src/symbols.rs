//! Picks the symbols a run will download.

use std::sync::Arc;

use indexmap::IndexSet;
use market_data_source::providers::MarketDataSource;
use tracing::{error, info, warn};

use crate::{
    config::BuilderConfig,
    store::{BarStore, SymbolInfo},
};

/// Symbols to download, in source (or config) order, without duplicates.
///
/// With `auto_detect_symbols` every listed instrument is classified and its
/// metadata upserted into the store before the category filter is applied.
/// Otherwise `symbols_to_download` is used as is.
pub async fn resolve_symbols(
    config: &BuilderConfig,
    source: &dyn MarketDataSource,
    store: Arc<dyn BarStore>,
) -> Vec<String> {
    if !config.auto_detect_symbols {
        let symbols: IndexSet<String> = config.symbols_to_download.iter().cloned().collect();
        info!(count = symbols.len(), "Using configured symbol list");
        return symbols.into_iter().collect();
    }

    let listed = match source.list_symbols().await {
        Ok(listed) => listed,
        Err(e) => {
            error!(error = %e, "Could not list terminal symbols");
            return Vec::new();
        }
    };
    if listed.is_empty() {
        warn!("Terminal listed no symbols");
        return Vec::new();
    }

    let infos: Vec<SymbolInfo> = listed.iter().map(SymbolInfo::from).collect();
    let filter = config.category_filter();
    let selected: IndexSet<String> = infos
        .iter()
        .filter(|info| filter.admits(info.category))
        .map(|info| info.symbol.clone())
        .collect();

    let found = infos.len();
    let saved = tokio::task::spawn_blocking(move || {
        infos
            .iter()
            .filter(|info| match store.upsert_symbol_info(info) {
                Ok(()) => true,
                Err(e) => {
                    warn!(symbol = %info.symbol, error = %e, "Could not save symbol info");
                    false
                }
            })
            .count()
    })
    .await;
    match saved {
        Ok(saved) => info!(found, saved, selected = selected.len(), "Symbols detected"),
        Err(e) => warn!(error = %e, "Saving symbol info did not complete"),
    }

    selected.into_iter().collect()
}
