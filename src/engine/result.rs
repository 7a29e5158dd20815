use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::engine::exposure::Exposure;
use crate::types::{
    ExposureMap, GammaExposureSummary, PriceRecord, StrikeExposureRecord, TickerResult,
};

/// Tolerance on the strike window edge so that e.g. 115 stays inside 100 ± 15%.
const WINDOW_EPSILON: f64 = 1e-9;

/// Assembles the three persisted outputs for one ticker and one as-of date.
pub struct ResultBuilder {
    ticker_id: i64,
    date: NaiveDate,
    strike_window_pct: f64,
}

impl ResultBuilder {
    pub fn new(ticker_id: i64, date: NaiveDate, strike_window_pct: f64) -> Self {
        Self { ticker_id, date, strike_window_pct }
    }

    pub fn build(&self, spot: f64, exposure: &Exposure, flip_price: f64, percentile: u8) -> TickerResult {
        let total_gex = if exposure.total_gex.is_nan() { 0.0 } else { exposure.total_gex };

        TickerResult {
            summary: GammaExposureSummary {
                ticker_id: self.ticker_id,
                total_gex,
                flip_price,
                percentile: percentile.min(100),
                date: self.date,
            },
            price: PriceRecord {
                ticker_id: self.ticker_id,
                price: spot,
                date: self.date,
            },
            strikes: self.strike_records(&exposure.by_strike, spot),
        }
    }

    /// Strike records within the window around spot, merged on integer strike.
    pub fn strike_records(&self, by_strike: &ExposureMap, spot: f64) -> Vec<StrikeExposureRecord> {
        let raw = by_strike
            .iter()
            .filter(|(strike, _)| within_window(strike.value(), spot, self.strike_window_pct))
            .map(|(strike, net)| StrikeExposureRecord {
                ticker_id: self.ticker_id,
                strike: strike.value() as i64,
                net_gex: if net.is_nan() { 0.0 } else { *net },
                date: self.date,
            });
        merge_by_strike(raw)
    }
}

/// `spot × (1 - pct) <= strike <= spot × (1 + pct)`, edges inclusive.
pub fn within_window(strike: f64, spot: f64, pct: f64) -> bool {
    spot > 0.0 && (strike - spot).abs() / spot <= pct + WINDOW_EPSILON
}

/// Collapses records sharing an integer strike by summing `net_gex`.
/// The first record seen for a strike supplies the other fields.
pub fn merge_by_strike(
    records: impl IntoIterator<Item = StrikeExposureRecord>,
) -> Vec<StrikeExposureRecord> {
    let mut merged: BTreeMap<i64, StrikeExposureRecord> = BTreeMap::new();
    for record in records {
        merged
            .entry(record.strike)
            .and_modify(|existing| existing.net_gex += record.net_gex)
            .or_insert(record);
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::exposure::AggregateStats;
    use crate::types::Strike;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn builder() -> ResultBuilder {
        ResultBuilder::new(7, date(), 0.15)
    }

    fn exposure(total_gex: f64, entries: &[(f64, f64)]) -> Exposure {
        Exposure {
            total_gex,
            by_strike: entries.iter().map(|&(k, v)| (Strike(k), v)).collect(),
            stats: AggregateStats::default(),
        }
    }

    fn record(strike: i64, net_gex: f64) -> StrikeExposureRecord {
        StrikeExposureRecord { ticker_id: 7, strike, net_gex, date: date() }
    }

    #[test]
    fn strike_window_is_inclusive_at_both_edges() {
        let ex = exposure(
            1.0,
            &[(80.0, 1.0), (85.0, 1.0), (90.0, 1.0), (100.0, 1.0), (110.0, 1.0), (115.0, 1.0), (116.0, 1.0)],
        );
        let strikes: Vec<i64> = builder()
            .strike_records(&ex.by_strike, 100.0)
            .iter()
            .map(|r| r.strike)
            .collect();
        assert_eq!(strikes, vec![85, 90, 100, 110, 115]);
    }

    #[test]
    fn fractional_strikes_merge_on_integer_strike() {
        let ex = exposure(1.0, &[(100.0, 5.0), (100.5, -2.0), (101.0, 4.0)]);
        let records = builder().strike_records(&ex.by_strike, 100.0);
        assert_eq!(records, vec![record(100, 3.0), record(101, 4.0)]);
    }

    #[test]
    fn duplicate_records_are_summed() {
        let merged = merge_by_strike(vec![record(100, 5.0), record(95, 1.0), record(100, -2.0)]);
        assert_eq!(merged, vec![record(95, 1.0), record(100, 3.0)]);
    }

    #[test]
    fn build_assembles_all_three_outputs() {
        let ex = exposure(1234.5, &[(95.0, -10.0), (100.0, 20.0), (200.0, 1.0)]);
        let result = builder().build(101.0, &ex, 95.0, 62);

        assert_eq!(result.summary.ticker_id, 7);
        assert_eq!(result.summary.total_gex, 1234.5);
        assert_eq!(result.summary.flip_price, 95.0);
        assert_eq!(result.summary.percentile, 62);
        assert_eq!(result.summary.date, date());
        assert_eq!(result.price.price, 101.0);
        assert_eq!(result.strikes, vec![record(95, -10.0), record(100, 20.0)]);
    }

    #[test]
    fn nan_total_is_normalized_to_zero() {
        let result = builder().build(100.0, &exposure(f64::NAN, &[]), 100.0, 50);
        assert_eq!(result.summary.total_gex, 0.0);
        assert!(result.strikes.is_empty());
    }
}
