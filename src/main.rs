mod api;
mod config;
mod db;
mod engine;
mod error;
mod fetcher;
mod runner;
mod schedule;
mod scorer;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::{router, ApiState};
use crate::config::Config;
use crate::db::{DbReader, DbWriter};
use crate::engine::{CleanResult, Sanitize};
use crate::error::{AppError, Result};
use crate::fetcher::YahooClient;
use crate::runner::{BatchReport, BatchRunner, EngineSettings, TickerOutcome};
use crate::schedule::market_closed;

#[derive(Parser)]
#[command(name = "gex-scanner")]
#[command(about = "Daily gamma exposure, flip price and percentile for an equity watchlist", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and persist exposure for every watchlist ticker (default)
    Run {
        /// Print the sanitized results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compute and persist a single watchlist ticker
    Ticker {
        symbol: String,
        /// Print the sanitized result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scheduled wrapper around `run` with optional market-close guard
    Job {
        /// Also write the log to a timestamped file in this directory
        #[arg(long, env = "LOG_DIR")]
        log_dir: Option<PathBuf>,
    },
    /// Serve persisted results over HTTP
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    let log_file = match &cli.command {
        Some(Commands::Job { log_dir: Some(dir) }) => match open_log_file(dir) {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("Could not open log file in {}: {e}", dir.display());
                None
            }
        },
        _ => None,
    };
    init_tracing(&cfg.log_level, log_file);

    let command = cli.command.unwrap_or(Commands::Run { json: false });
    let code = match command {
        Commands::Run { json } => match run_watchlist(&cfg).await {
            Ok(report) => {
                if json {
                    print_json(report.results().map(Sanitize::sanitize).collect());
                }
                0
            }
            Err(e) => {
                error!("Fatal error: {e}");
                1
            }
        },
        Commands::Ticker { symbol, json } => run_single(&cfg, &symbol, json).await,
        Commands::Job { .. } => run_job(&cfg).await,
        Commands::Serve => match serve(&cfg).await {
            Ok(()) => 0,
            Err(e) => {
                error!("Fatal error: {e}");
                1
            }
        },
    };

    std::process::exit(code);
}

fn init_tracing(level: &str, log_file: Option<std::fs::File>) {
    let file_layer = log_file.map(|f| fmt::layer().with_ansi(false).with_writer(Mutex::new(f)));
    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(fmt::layer())
        .with(file_layer)
        .init();
}

fn open_log_file(dir: &Path) -> std::io::Result<std::fs::File> {
    std::fs::create_dir_all(dir)?;
    let name = format!("gex_job_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
    std::fs::File::create(dir.join(name))
}

struct Store {
    writer: DbWriter,
    reader: DbReader,
}

async fn open_store(cfg: &Config) -> Result<Store> {
    let pool = db::connect(&cfg.db_path).await?;
    let writer = DbWriter::new(pool.clone());
    writer.seed_watchlist(&cfg.watchlist_seed).await?;
    Ok(Store { writer, reader: DbReader::new(pool) })
}

async fn run_watchlist(cfg: &Config) -> Result<BatchReport> {
    let store = open_store(cfg).await?;
    let source = YahooClient::new(cfg)?;

    let entries = store.reader.watchlist().await?;
    if entries.is_empty() {
        warn!("Watchlist is empty. Set WATCHLIST=SPY,QQQ,... to seed it");
        return Ok(BatchReport::default());
    }

    let runner = BatchRunner::new(EngineSettings::from(cfg), &source, &store.reader, &store.writer);
    Ok(runner.run_batch(&entries, Local::now().date_naive()).await)
}

/// Single-ticker mode: any skip or failure is a non-zero exit.
async fn run_single(cfg: &Config, symbol: &str, json: bool) -> i32 {
    let report = match single_ticker_report(cfg, symbol).await {
        Ok(r) => r,
        Err(e) => {
            error!("{e}");
            return 1;
        }
    };

    match report.outcomes.into_iter().next() {
        Some(TickerOutcome::Saved { ticker, result, report }) => {
            if json {
                print_json(vec![result.sanitize()]);
            }
            if report.is_ok() {
                info!("Data saved for {ticker}");
                0
            } else {
                error!("Database error while saving {ticker}");
                1
            }
        }
        Some(TickerOutcome::Skipped { ticker, reason }) => {
            error!("Skipped {ticker}: {reason}");
            1
        }
        Some(TickerOutcome::Failed { ticker, error }) => {
            error!("Error processing {ticker}: {error}");
            1
        }
        None => 1,
    }
}

async fn single_ticker_report(cfg: &Config, symbol: &str) -> Result<BatchReport> {
    let store = open_store(cfg).await?;
    let entry = store
        .reader
        .find_ticker(symbol)
        .await?
        .ok_or_else(|| AppError::NotInWatchlist(symbol.to_ascii_uppercase()))?;
    let source = YahooClient::new(cfg)?;

    let runner = BatchRunner::new(EngineSettings::from(cfg), &source, &store.reader, &store.writer);
    Ok(runner.run_batch(&[entry], Local::now().date_naive()).await)
}

async fn run_job(cfg: &Config) -> i32 {
    info!("Market data job started at {}", Local::now().to_rfc3339());

    if cfg.require_market_closed && !market_closed(Local::now().naive_local()) {
        warn!("REQUIRE_MARKET_CLOSED is set and the market is not closed; nothing to do");
        return 0;
    }

    info!("{}", "=".repeat(60));
    info!("Starting market data fetch...");
    info!("{}", "=".repeat(60));

    match run_watchlist(cfg).await {
        Ok(report) => {
            info!("{}", "=".repeat(60));
            info!(
                "Market data fetch completed: {} saved, {} skipped, {} failed",
                report.saved(),
                report.skipped(),
                report.failed(),
            );
            info!("{}", "=".repeat(60));
            info!("Job completed successfully");
            0
        }
        Err(e) => {
            error!("{}", "=".repeat(60));
            error!("Error during fetch: {e}");
            error!("{}", "=".repeat(60));
            error!("Job failed");
            1
        }
    }
}

async fn serve(cfg: &Config) -> Result<()> {
    let store = open_store(cfg).await?;
    let app = router(ApiState { reader: store.reader });

    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

fn print_json(results: Vec<CleanResult>) {
    match serde_json::to_string_pretty(&results) {
        Ok(s) => println!("{s}"),
        Err(e) => error!("Could not serialize results: {e}"),
    }
}
