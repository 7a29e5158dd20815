use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WatchlistEntry {
    pub id: i64,
    pub ticker: String,
}

// ---------------------------------------------------------------------------
// Option chain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

impl std::fmt::Display for OptionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionSide::Call => write!(f, "call"),
            OptionSide::Put => write!(f, "put"),
        }
    }
}

/// One listed contract, validated at the market data boundary.
/// `strike` is always positive; `implied_volatility` is kept as reported and
/// judged by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: f64,
    pub implied_volatility: Option<f64>,
    pub open_interest: u64,
    pub side: OptionSide,
    pub expiration: NaiveDate,
}

impl OptionContract {
    /// Implied volatility usable by the gamma model: present, finite and positive.
    pub fn usable_iv(&self) -> Option<f64> {
        self.implied_volatility
            .filter(|iv| iv.is_finite() && *iv > 0.0)
    }
}

/// Calls and puts across all processed expirations for one ticker.
pub type OptionChain = Vec<OptionContract>;

// ---------------------------------------------------------------------------
// Exposure map
// ---------------------------------------------------------------------------

/// Strike price usable as an ordered map key. Keys are compared with
/// `f64::total_cmp`, so identical raw strikes collapse into one entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Strike(pub f64);

impl Strike {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Strike {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Strike {}

impl PartialOrd for Strike {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Strike {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Signed exposure per raw strike, iterated in ascending strike order.
pub type ExposureMap = BTreeMap<Strike, f64>;

// ---------------------------------------------------------------------------
// Per-ticker results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GammaExposureSummary {
    pub ticker_id: i64,
    pub total_gex: f64,
    pub flip_price: f64,
    pub percentile: u8,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub ticker_id: i64,
    pub price: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeExposureRecord {
    pub ticker_id: i64,
    pub strike: i64,
    pub net_gex: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerResult {
    pub summary: GammaExposureSummary,
    pub price: PriceRecord,
    pub strikes: Vec<StrikeExposureRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(iv: Option<f64>) -> OptionContract {
        OptionContract {
            strike: 100.0,
            implied_volatility: iv,
            open_interest: 10,
            side: OptionSide::Call,
            expiration: NaiveDate::from_ymd_opt(2026, 1, 16).unwrap(),
        }
    }

    #[test]
    fn usable_iv_rejects_missing_nonpositive_and_nan() {
        assert_eq!(contract(Some(0.25)).usable_iv(), Some(0.25));
        assert!(contract(None).usable_iv().is_none());
        assert!(contract(Some(0.0)).usable_iv().is_none());
        assert!(contract(Some(-0.1)).usable_iv().is_none());
        assert!(contract(Some(f64::NAN)).usable_iv().is_none());
    }

    #[test]
    fn strike_keys_sort_ascending_and_merge_equal() {
        let mut map = ExposureMap::new();
        *map.entry(Strike(105.0)).or_insert(0.0) += 1.0;
        *map.entry(Strike(95.5)).or_insert(0.0) += 2.0;
        *map.entry(Strike(105.0)).or_insert(0.0) += 3.0;

        let entries: Vec<(f64, f64)> = map.iter().map(|(k, v)| (k.value(), *v)).collect();
        assert_eq!(entries, vec![(95.5, 2.0), (105.0, 4.0)]);
    }
}
