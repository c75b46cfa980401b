//! Run configuration: TOML file, every key optional.
//!
//! ```toml
//! database_path = "mt5_historical_data.db"
//! source_dir = "terminal_export"
//! timeframes = ["H1", "D1"]
//! max_bars_per_request = 50000
//! max_workers = 4
//! include_crypto = false
//! ```
//!
//! Missing keys take the values of [`BuilderConfig::default`].

use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use market_data_source::models::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::classify::Category;

/// Errors reading or writing the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        /// Config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The file is not valid TOML or has values of the wrong type.
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        /// Config file.
        path: PathBuf,
        /// TOML error, with line and column.
        source: toml::de::Error,
    },
    /// The config could not be rendered as TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// The file could not be written.
    #[error("failed to write config {}: {source}", .path.display())]
    Write {
        /// Config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Everything one run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// SQLite file the bars are written to.
    pub database_path: PathBuf,
    /// Terminal export directory read by the snapshot source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<PathBuf>,
    /// Also append logs to this file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Symbols to download when `auto_detect_symbols` is off.
    pub symbols_to_download: Vec<String>,
    /// Timeframes to request, in order.
    pub timeframes: Vec<Timeframe>,
    /// Most recent bars requested per `(symbol, timeframe)`.
    pub max_bars_per_request: usize,
    /// Symbols downloaded concurrently.
    pub max_workers: usize,
    /// Pause between two timeframe requests of one symbol.
    pub request_pause_ms: u64,
    /// Keep [`Category::Index`] symbols when auto-detecting.
    pub include_indices: bool,
    /// Keep [`Category::Forex`] symbols when auto-detecting.
    pub include_forex: bool,
    /// Keep [`Category::Commodity`] symbols when auto-detecting.
    pub include_commodities: bool,
    /// Keep [`Category::Crypto`] symbols when auto-detecting.
    pub include_crypto: bool,
    /// Take every symbol the terminal lists instead of `symbols_to_download`.
    pub auto_detect_symbols: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("mt5_historical_data.db"),
            source_dir: None,
            log_file: None,
            symbols_to_download: Vec::new(),
            timeframes: Timeframe::ALL.to_vec(),
            max_bars_per_request: 50_000,
            max_workers: 4,
            request_pause_ms: 100,
            include_indices: true,
            include_forex: true,
            include_commodities: true,
            include_crypto: true,
            auto_detect_symbols: true,
        }
    }
}

impl BuilderConfig {
    /// Strict load: any read or parse problem is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&s).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Lenient load used by the CLI.
    ///
    /// A missing file is created with the defaults. An unreadable or malformed
    /// file is logged and the defaults are used for this run.
    pub fn load_or_create(path: &Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            match config.save(path) {
                Ok(()) => info!(path = %path.display(), "Wrote default config"),
                Err(e) => error!(error = %e, "Could not write default config"),
            }
            return config;
        }

        match Self::load(path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded config");
                config
            }
            Err(e) => {
                error!(error = %e, "Using default config");
                Self::default()
            }
        }
    }

    /// Writes the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let s = toml::to_string_pretty(self)?;
        std::fs::write(path, s).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `request_pause_ms` as a [`Duration`].
    pub fn request_pause(&self) -> Duration {
        Duration::from_millis(self.request_pause_ms)
    }

    /// Filter built from the four `include_*` flags.
    pub fn category_filter(&self) -> CategoryFilter {
        CategoryFilter {
            indices: self.include_indices,
            forex: self.include_forex,
            commodities: self.include_commodities,
            crypto: self.include_crypto,
        }
    }
}

/// Which categories an auto-detected symbol list keeps. [`Category::Other`] is always kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryFilter {
    /// Stock and volatility indices.
    pub indices: bool,
    /// Currency pairs.
    pub forex: bool,
    /// Metals and energy.
    pub commodities: bool,
    /// Crypto currencies.
    pub crypto: bool,
}

impl CategoryFilter {
    /// Whether a symbol of `category` is downloaded.
    pub fn admits(&self, category: Category) -> bool {
        match category {
            Category::Index => self.indices,
            Category::Forex => self.forex,
            Category::Commodity => self.commodities,
            Category::Crypto => self.crypto,
            Category::Other => true,
        }
    }
}
