use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use history_builder::{
    config::BuilderConfig, pipeline, store::SqliteStore, telemetry::init_tracing,
};
use shared_utils::env::get_env_var;
use tokio::sync::watch;
use tracing::{info, warn};

const CONFIG_ENV: &str = "HISTORY_BUILDER_CONFIG";
const DEFAULT_CONFIG: &str = "history_builder.toml";

#[derive(Parser)]
#[command(version, about = "Build a local SQLite history of terminal OHLCV bars")]
struct Cli {
    /// Config file (default: $HISTORY_BUILDER_CONFIG or history_builder.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Debug-level logging
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Download every configured symbol and timeframe into the database
    Run {
        #[arg(long, value_name = "FILE")]
        database: Option<PathBuf>,
        /// Terminal export directory
        #[arg(long, value_name = "DIR")]
        source: Option<PathBuf>,
    },
    /// Write the default config file
    InitConfig {
        #[arg(long)]
        force: bool,
    },
    /// Print database totals
    Summary {
        #[arg(long, value_name = "FILE")]
        database: Option<PathBuf>,
    },
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(|| {
        get_env_var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = config_path(&cli);

    match cli.cmd {
        Cmd::Run { database, source } => {
            let log_file = BuilderConfig::load(&config_path)
                .ok()
                .and_then(|c| c.log_file);
            init_tracing(cli.debug, log_file.as_deref())?;

            let mut config = BuilderConfig::load_or_create(&config_path);
            if let Some(database) = database {
                config.database_path = database;
            }
            if let Some(source) = source {
                config.source_dir = Some(source);
            }

            let Some(source_dir) = config.source_dir.clone() else {
                bail!("no terminal export configured: pass --source or set source_dir");
            };

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing symbols already in progress");
                    let _ = shutdown_tx.send(true);
                }
            });

            let stats = pipeline::build_from_snapshot(&config, &source_dir, Some(shutdown_rx))
                .await
                .context("history build failed")?;
            if stats.interrupted {
                info!("Run interrupted; rerun to download the remaining symbols");
            }
        }
        Cmd::InitConfig { force } => {
            init_tracing(cli.debug, None)?;
            if config_path.exists() && !force {
                bail!(
                    "{} already exists, pass --force to overwrite",
                    config_path.display()
                );
            }
            BuilderConfig::default().save(&config_path)?;
            info!(path = %config_path.display(), "Wrote default config");
        }
        Cmd::Summary { database } => {
            init_tracing(cli.debug, None)?;
            let path = match database {
                Some(path) => path,
                None => BuilderConfig::load(&config_path)
                    .map(|c| c.database_path)
                    .unwrap_or_else(|_| BuilderConfig::default().database_path),
            };
            let path = path.to_string_lossy().into_owned();
            let store = SqliteStore::open(&path)
                .with_context(|| format!("open database {path}"))?;
            let s = store.summary()?;
            println!("database:   {path}");
            println!("bars:       {}", s.total_bars);
            println!("symbols:    {}", s.symbols);
            println!("timeframes: {}", s.timeframes);
        }
    }

    Ok(())
}
