use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use tracing::debug;

use crate::config::{Config, USER_AGENT};
use crate::error::{AppError, Result};
use crate::types::{OptionChain, OptionContract, OptionSide};

/// Source of spot prices and listed option chains.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Latest close, or `None` when the source has no price for the ticker.
    async fn spot_price(&self, ticker: &str) -> Result<Option<f64>>;

    /// Listed expirations, ascending.
    async fn expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>>;

    /// Calls and puts for a single expiration.
    async fn chain(&self, ticker: &str, expiration: NaiveDate) -> Result<OptionChain>;
}

/// Counts of raw chain rows dropped at the ingestion boundary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChainStats {
    pub accepted: usize,
    pub rejected_strike: usize,
    pub rejected_open_interest: usize,
}

enum Rejection {
    Strike,
    OpenInterest,
}

/// Yahoo Finance chart + options endpoints.
pub struct YahooClient {
    client: reqwest::Client,
    base_url: String,
}

impl YahooClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.market_data_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn spot_price(&self, ticker: &str) -> Result<Option<f64>> {
        let url = format!("{}/v8/finance/chart/{}?range=1d&interval=1d", self.base_url, ticker);
        let resp = self.get_json(&url).await?;
        Ok(parse_spot(&resp))
    }

    async fn expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>> {
        let url = format!("{}/v7/finance/options/{}", self.base_url, ticker);
        let resp = self.get_json(&url).await?;
        parse_expirations(&resp)
    }

    async fn chain(&self, ticker: &str, expiration: NaiveDate) -> Result<OptionChain> {
        let ts = expiration
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| AppError::MarketData(format!("bad expiration {expiration}")))?;
        let url = format!("{}/v7/finance/options/{}?date={}", self.base_url, ticker, ts);
        let resp = self.get_json(&url).await?;

        let (contracts, stats) = parse_chain(&resp, expiration)?;
        debug!(
            ticker,
            %expiration,
            accepted = stats.accepted,
            rejected_strike = stats.rejected_strike,
            rejected_open_interest = stats.rejected_open_interest,
            "fetched option chain"
        );
        Ok(contracts)
    }
}

/// Latest non-null close from a chart response, falling back to
/// `meta.regularMarketPrice`. Non-positive prices count as unavailable.
pub fn parse_spot(v: &serde_json::Value) -> Option<f64> {
    let result = v.pointer("/chart/result/0")?;

    let last_close = result
        .pointer("/indicators/quote/0/close")
        .and_then(|c| c.as_array())
        .and_then(|closes| closes.iter().rev().find_map(|c| c.as_f64()));

    last_close
        .or_else(|| result.pointer("/meta/regularMarketPrice").and_then(|p| p.as_f64()))
        .filter(|p| p.is_finite() && *p > 0.0)
}

fn option_result(v: &serde_json::Value) -> Result<&serde_json::Value> {
    if let Some(err) = v.pointer("/optionChain/error").filter(|e| !e.is_null()) {
        return Err(AppError::MarketData(format!("options endpoint error: {err}")));
    }
    v.pointer("/optionChain/result/0")
        .ok_or_else(|| AppError::MarketData("options response had no result".to_string()))
}

pub fn parse_expirations(v: &serde_json::Value) -> Result<Vec<NaiveDate>> {
    let result = option_result(v)?;
    let mut dates: Vec<NaiveDate> = result
        .get("expirationDates")
        .and_then(|d| d.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|ts| ts.as_i64())
                .filter_map(|ts| DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.date_naive())
                .collect()
        })
        .unwrap_or_default();
    dates.sort();
    dates.dedup();
    Ok(dates)
}

/// Validates raw call/put rows into contracts for `expiration`.
pub fn parse_chain(
    v: &serde_json::Value,
    expiration: NaiveDate,
) -> Result<(OptionChain, ChainStats)> {
    let result = option_result(v)?;
    let mut contracts = Vec::new();
    let mut stats = ChainStats::default();

    let Some(options) = result.pointer("/options/0") else {
        return Ok((contracts, stats));
    };

    for (key, side) in [("calls", OptionSide::Call), ("puts", OptionSide::Put)] {
        let rows = options.get(key).and_then(|r| r.as_array());
        for row in rows.into_iter().flatten() {
            match parse_contract(row, side, expiration) {
                Ok(contract) => {
                    stats.accepted += 1;
                    contracts.push(contract);
                }
                Err(Rejection::Strike) => stats.rejected_strike += 1,
                Err(Rejection::OpenInterest) => stats.rejected_open_interest += 1,
            }
        }
    }

    Ok((contracts, stats))
}

fn parse_contract(
    row: &serde_json::Value,
    side: OptionSide,
    expiration: NaiveDate,
) -> std::result::Result<OptionContract, Rejection> {
    let strike = row
        .get("strike")
        .and_then(|s| s.as_f64())
        .filter(|s| s.is_finite() && *s > 0.0)
        .ok_or(Rejection::Strike)?;

    let open_interest = row
        .get("openInterest")
        .and_then(|oi| oi.as_f64())
        .filter(|oi| oi.is_finite() && *oi >= 0.0)
        .map(|oi| oi as u64)
        .ok_or(Rejection::OpenInterest)?;

    Ok(OptionContract {
        strike,
        implied_volatility: row.get("impliedVolatility").and_then(|iv| iv.as_f64()),
        open_interest,
        side,
        expiration,
    })
}
