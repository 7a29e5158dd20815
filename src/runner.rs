use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::config::{Config, DEBUG_STRIKE_BAND};
use crate::db::{HistoryStore, PersistenceSink};
use crate::engine::{locate_flip, ExposureAggregator, ResultBuilder, Sanitize};
use crate::error::{AppError, Result};
use crate::fetcher::MarketDataSource;
use crate::scorer::PercentileScorer;
use crate::types::{ExposureMap, OptionChain, TickerResult, WatchlistEntry};

/// Engine parameters taken from `Config`.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub risk_free_rate: f64,
    pub max_expirations: usize,
    pub strike_window_pct: f64,
}

impl From<&Config> for EngineSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            risk_free_rate: cfg.risk_free_rate,
            max_expirations: cfg.max_expirations,
            strike_window_pct: cfg.strike_window_pct,
        }
    }
}

/// Outcome of each write target for one ticker. Writes are attempted
/// independently; an earlier failure does not stop or undo later ones.
#[derive(Debug)]
pub struct PersistReport {
    pub summary: Result<()>,
    pub price: Result<()>,
    pub strikes: Result<usize>,
}

impl PersistReport {
    pub fn is_ok(&self) -> bool {
        self.summary.is_ok() && self.price.is_ok() && self.strikes.is_ok()
    }
}

#[derive(Debug)]
pub enum TickerOutcome {
    Saved {
        ticker: String,
        result: TickerResult,
        report: PersistReport,
    },
    Skipped {
        ticker: String,
        reason: String,
    },
    Failed {
        ticker: String,
        error: AppError,
    },
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<TickerOutcome>,
}

impl BatchReport {
    pub fn saved(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TickerOutcome::Saved { report, .. } if report.is_ok()))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, TickerOutcome::Skipped { .. })).count()
    }

    /// Tickers that failed to compute or had at least one failed write.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.saved() - self.skipped()
    }

    pub fn results(&self) -> impl Iterator<Item = &TickerResult> {
        self.outcomes.iter().filter_map(|o| match o {
            TickerOutcome::Saved { result, .. } => Some(result),
            _ => None,
        })
    }
}

/// Drives the exposure engine over a watchlist, one ticker at a time.
pub struct BatchRunner<'a> {
    settings: EngineSettings,
    source: &'a dyn MarketDataSource,
    history: &'a dyn HistoryStore,
    sink: &'a dyn PersistenceSink,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        settings: EngineSettings,
        source: &'a dyn MarketDataSource,
        history: &'a dyn HistoryStore,
        sink: &'a dyn PersistenceSink,
    ) -> Self {
        Self { settings, source, history, sink }
    }

    /// Processes and persists every entry. A failing ticker is recorded and
    /// the batch moves on.
    pub async fn run_batch(&self, entries: &[WatchlistEntry], as_of: NaiveDate) -> BatchReport {
        let mut report = BatchReport::default();

        for entry in entries {
            let outcome = match self.process_ticker(entry, as_of).await {
                Ok(Some(result)) => {
                    let persisted = self.persist(&result).await;
                    TickerOutcome::Saved { ticker: entry.ticker.clone(), result, report: persisted }
                }
                Ok(None) => {
                    warn!(ticker = %entry.ticker, "Skipping {}: no price data found", entry.ticker);
                    TickerOutcome::Skipped {
                        ticker: entry.ticker.clone(),
                        reason: "no price data".to_string(),
                    }
                }
                Err(e) => {
                    error!(ticker = %entry.ticker, "Error processing {}: {e}", entry.ticker);
                    TickerOutcome::Failed { ticker: entry.ticker.clone(), error: e }
                }
            };
            report.outcomes.push(outcome);
        }

        info!(
            tickers = entries.len(),
            saved = report.saved(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Batch complete"
        );
        report
    }

    /// Computes one ticker's results. `Ok(None)` when no spot price is available.
    pub async fn process_ticker(
        &self,
        entry: &WatchlistEntry,
        as_of: NaiveDate,
    ) -> Result<Option<TickerResult>> {
        info!(ticker = %entry.ticker, "Processing {}...", entry.ticker);

        let Some(spot) = self.source.spot_price(&entry.ticker).await? else {
            return Ok(None);
        };

        let aggregator = ExposureAggregator::new(self.settings.risk_free_rate, as_of);
        let expirations = self.source.expirations(&entry.ticker).await?;

        let mut chain = OptionChain::new();
        for expiration in expirations.into_iter().take(self.settings.max_expirations) {
            if aggregator.time_to_expiry(expiration) <= 0.0 {
                continue;
            }
            chain.extend(self.source.chain(&entry.ticker, expiration).await?);
        }

        let exposure = aggregator.aggregate(&chain, spot);
        log_strikes_near_spot(&entry.ticker, &exposure.by_strike, spot);

        let flip_price = locate_flip(&exposure.by_strike, spot);
        let percentile = PercentileScorer::new(self.history)
            .score(entry.id, exposure.total_gex)
            .await;

        let result = ResultBuilder::new(entry.id, as_of, self.settings.strike_window_pct)
            .build(spot, &exposure, flip_price, percentile);

        info!(
            ticker = %entry.ticker,
            spot,
            total_gex = result.summary.total_gex,
            flip_price = result.summary.flip_price,
            percentile = result.summary.percentile,
            contracts = chain.len(),
            calls = exposure.stats.calls,
            puts = exposure.stats.puts,
            strikes_kept = result.strikes.len(),
            "{} | total_gex: {:.2} | flip: {:.2} | percentile: {}",
            entry.ticker,
            result.summary.total_gex,
            result.summary.flip_price,
            result.summary.percentile,
        );

        Ok(Some(result))
    }

    /// Sanitizes and writes the three outputs, reporting each separately.
    pub async fn persist(&self, result: &TickerResult) -> PersistReport {
        let clean = result.sanitize();
        let ticker_id = clean.summary.ticker_id;

        let report = PersistReport {
            summary: self.sink.write_summary(&clean.summary).await,
            price: self.sink.write_price(&clean.price).await,
            strikes: self
                .sink
                .write_strikes(ticker_id, &clean.summary.date, &clean.strikes)
                .await,
        };

        if let Err(e) = &report.summary {
            error!(ticker_id, "Summary write failed: {e}");
        }
        if let Err(e) = &report.price {
            error!(ticker_id, "Price write failed: {e}");
        }
        match &report.strikes {
            Ok(n) => debug!(ticker_id, strikes = n, "Strike rows written"),
            Err(e) => error!(ticker_id, "Strike write failed: {e}"),
        }
        if report.is_ok() {
            info!(ticker_id, "Data saved for ticker_id {ticker_id}");
        }

        report
    }
}

fn log_strikes_near_spot(ticker: &str, by_strike: &ExposureMap, spot: f64) {
    let near: Vec<(f64, f64)> = by_strike
        .iter()
        .map(|(k, v)| (k.value(), *v))
        .filter(|(k, _)| (k - spot).abs() <= spot * DEBUG_STRIKE_BAND)
        .collect();
    debug!(ticker, "Strikes around spot ({spot:.2}):");
    for (strike, gex) in near.iter().rev().take(5).rev() {
        debug!(ticker, "  Strike {strike}: GEX = {gex:.2}");
    }
}
