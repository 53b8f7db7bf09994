//! pypi-rot main entry point
//!
//! This is the command-line interface for harvesting PyPI metadata and
//! compiling the URL liveness dataset.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pypi_rot::config::{resolve_cache_dir, resolve_config, Config};
use pypi_rot::dataset::DatasetBuilder;
use pypi_rot::output::{ensure_writable, load_statistics, print_statistics, CsvRowWriter};
use pypi_rot::scraper::run_perpetual_scraper;
use pypi_rot::storage::SqliteStore;
use pypi_rot::verifier::HttpProber;
use pypi_rot::{ConfigError, RateLimiter, Shutdown};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// pypi-rot: measure package rot on PyPI
///
/// Harvests package metadata under a strict rate limit into a durable local
/// cache, then checks whether the URLs in that metadata still resolve.
#[derive(Parser, Debug)]
#[command(name = "pypi-rot")]
#[command(version)]
#[command(about = "Measure package rot on PyPI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv); on `build` also logs every row
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest package metadata forever (Ctrl+C to stop; resumes on restart)
    PerpetualScraper {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Check every URL in the cached metadata and write the dataset
    Build {
        #[command(flatten)]
        common: CommonArgs,

        /// Where to write the CSV dataset
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Show statistics about the metadata cache and exit
    Stats {
        /// Directory holding the metadata cache
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,

        /// Path to TOML configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Contact email sent in the user agent of every request
    #[arg(long)]
    email: String,

    /// Directory holding the metadata cache
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl CommonArgs {
    fn resolve(&self) -> anyhow::Result<Config> {
        let config = resolve_config(
            self.config.as_deref(),
            Some(&self.email),
            self.cache_dir.as_deref(),
        )
        .context("Invalid configuration")?;

        tracing::debug!("Effective configuration: {:?}", config);
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::PerpetualScraper { common } => handle_scraper(common.resolve()?).await,
        Command::Build { common, output } => {
            handle_build(common.resolve()?, &output, cli.verbose > 0).await
        }
        Command::Stats { cache_dir, config } => {
            let cache_dir = resolve_cache_dir(config.as_deref(), cache_dir.as_deref())
                .context("Invalid configuration")?;
            handle_stats(&cache_dir)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pypi_rot=info,warn"),
            1 => EnvFilter::new("pypi_rot=debug,info"),
            2 => EnvFilter::new("pypi_rot=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles `perpetual-scraper`: loops over the index until stopped
async fn handle_scraper(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Starting perpetual scraper against {} (one request per {}ms)",
        config.index.base_url,
        config.limiter.min_interval_ms
    );

    let shutdown = Shutdown::new();
    shutdown.install_signal_handlers();

    let summary = run_perpetual_scraper(config, shutdown)
        .await
        .context("Failed to start the scraper")?;

    tracing::info!(
        "Scraper finished: {} passes completed, {} documents fetched this session",
        summary.passes_completed,
        summary.counts.fetched
    );
    Ok(())
}

/// Handles `build`: verifies every cached package and writes the dataset
async fn handle_build(config: Config, output: &Path, verbose: bool) -> anyhow::Result<()> {
    let store = SqliteStore::open_existing(&config.cache.dir).map_err(|e| ConfigError::CacheDir {
        path: config.cache.dir.display().to_string(),
        reason: e.to_string(),
    })?;
    let store = Arc::new(store);

    ensure_writable(output).map_err(|e| ConfigError::OutputPath {
        path: output.display().to_string(),
        reason: e.to_string(),
    })?;

    // Shares the request budget with a scraper running on the same cache
    let limiter =
        Arc::new(RateLimiter::new(config.limiter.min_interval()).with_ledger(store.clone()));
    let prober = HttpProber::new(&config.verifier, &config.user_agent, limiter)
        .context("Failed to build the HTTP client")?;

    let shutdown = Shutdown::new();
    shutdown.install_signal_handlers();

    let builder = DatasetBuilder::new(store, Arc::new(prober))
        .include_release_history(config.verifier.include_release_history)
        .verbose(verbose)
        .with_shutdown(shutdown);

    tracing::info!("Building dataset into {}", output.display());
    let mut writer = CsvRowWriter::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let summary = builder.build(&mut writer).await.context("Dataset build failed")?;

    tracing::info!(
        "Dataset complete: {} packages, {} URLs checked ({} reachable, {} unreachable, {} probe errors)",
        summary.packages,
        summary.urls_checked,
        summary.reachable,
        summary.unreachable,
        summary.probe_errors
    );
    if summary.unreadable_records > 0 {
        tracing::warn!("{} cached records could not be read", summary.unreadable_records);
    }
    if summary.interrupted {
        tracing::warn!("Build was stopped early; the dataset is partial");
    }

    Ok(())
}

/// Handles `stats`: shows statistics from the metadata cache
fn handle_stats(cache_dir: &Path) -> anyhow::Result<()> {
    let store = SqliteStore::open_existing(cache_dir).map_err(|e| ConfigError::CacheDir {
        path: cache_dir.display().to_string(),
        reason: e.to_string(),
    })?;

    println!("Cache: {}\n", cache_dir.display());
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}
