//! # VecTrekker CLI (`vectrekker`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vectrekker init` | Create the change cache |
//! | `vectrekker status` | List files that are new or changed since the last sync |
//! | `vectrekker sync` | Index changed files and record them in the cache |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (e.g. `RUST_LOG=vectrekker=debug`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vectrekker::{cache, config, status, sync};

/// VecTrekker — index text content on disk, embed it into vectors and upsert
/// it to a vector store for usage with LLMs.
#[derive(Parser)]
#[command(name = "vectrekker", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `~/.vectrekker/config.toml`, which is created empty on
    /// first use.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the change cache if it does not exist. Safe to run repeatedly.
    Init,

    /// List files that are new or changed since they were last indexed.
    Status {
        /// Print one JSON object per changed file.
        #[arg(long)]
        json: bool,
    },

    /// Index every new or changed file.
    ///
    /// Only files that index successfully are recorded; failures are retried
    /// on the next run.
    Sync {
        /// Report the changed files without indexing or recording anything.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of changed files to process.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => {
            let path = config::default_config_path()?;
            config::ensure_config_file(&path)?;
            path
        }
    };

    let cfg = config::load_config(&config_path)?;

    match cli.command {
        Commands::Init => {
            let cache_path = cfg.cache_path()?;
            let cache = cache::ChangeCache::open(&cache_path).await?;
            let tracked = cache.len().await;
            cache.close().await;
            let tracked = tracked?;
            println!("Cache initialized at {}", cache_path.display());
            println!("  tracked files: {}", tracked);
        }
        Commands::Status { json } => {
            status::run_status(&cfg, json).await?;
        }
        Commands::Sync { dry_run, limit } => {
            sync::run_sync(&cfg, dry_run, limit).await?;
        }
    }

    Ok(())
}
