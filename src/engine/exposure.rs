use chrono::NaiveDate;
use tracing::debug;

use crate::config::{CONTRACT_MULTIPLIER, DAYS_PER_YEAR, ONE_PERCENT_MOVE};
use crate::engine::gamma::gamma;
use crate::types::{ExposureMap, OptionContract, OptionSide, Strike};

/// Why contracts were left out of an aggregation, for the per-ticker log line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregateStats {
    pub calls: usize,
    pub puts: usize,
    pub skipped_expired: usize,
    pub skipped_bad_iv: usize,
    pub skipped_zero_gamma: usize,
    pub skipped_non_finite: usize,
}

#[derive(Debug, Clone)]
pub struct Exposure {
    /// Calls add their exposure; puts subtract their (negative) signed exposure.
    pub total_gex: f64,
    /// Signed exposure per raw strike: calls positive, puts negative.
    pub by_strike: ExposureMap,
    pub stats: AggregateStats,
}

/// Folds an option chain into a total and a per-strike exposure map.
pub struct ExposureAggregator {
    risk_free_rate: f64,
    as_of: NaiveDate,
}

impl ExposureAggregator {
    pub fn new(risk_free_rate: f64, as_of: NaiveDate) -> Self {
        Self { risk_free_rate, as_of }
    }

    /// Year fraction from the as-of date to `expiration`, 365-day year.
    /// Same-day and past expirations give `<= 0`.
    pub fn time_to_expiry(&self, expiration: NaiveDate) -> f64 {
        (expiration - self.as_of).num_days() as f64 / DAYS_PER_YEAR
    }

    pub fn aggregate(&self, chain: &[OptionContract], spot: f64) -> Exposure {
        let mut total_gex = 0.0;
        let mut by_strike = ExposureMap::new();
        let mut stats = AggregateStats::default();

        for contract in chain {
            let t = self.time_to_expiry(contract.expiration);
            if t <= 0.0 {
                stats.skipped_expired += 1;
                continue;
            }

            let Some(iv) = contract.usable_iv() else {
                stats.skipped_bad_iv += 1;
                continue;
            };

            let g = gamma(spot, contract.strike, t, self.risk_free_rate, iv);
            if g.is_nan() || g <= 0.0 {
                stats.skipped_zero_gamma += 1;
                continue;
            }

            let magnitude = contract_exposure(g, contract.open_interest, spot);
            let signed = match contract.side {
                OptionSide::Call => magnitude,
                OptionSide::Put => -magnitude,
            };
            if !signed.is_finite() {
                stats.skipped_non_finite += 1;
                continue;
            }

            match contract.side {
                OptionSide::Call => {
                    stats.calls += 1;
                    total_gex += signed;
                }
                OptionSide::Put => {
                    stats.puts += 1;
                    // The total subtracts the signed put exposure; only the
                    // per-strike map keeps puts negative.
                    total_gex -= signed;
                }
            }
            *by_strike.entry(Strike(contract.strike)).or_insert(0.0) += signed;
        }

        if !total_gex.is_finite() {
            total_gex = 0.0;
        }

        debug!(
            calls = stats.calls,
            puts = stats.puts,
            skipped_expired = stats.skipped_expired,
            skipped_bad_iv = stats.skipped_bad_iv,
            skipped_zero_gamma = stats.skipped_zero_gamma,
            skipped_non_finite = stats.skipped_non_finite,
            strikes = by_strike.len(),
            "aggregated option chain"
        );

        Exposure { total_gex, by_strike, stats }
    }
}

/// Dollar gamma per 1% move: `gamma × OI × 100 × spot² × 0.01`.
pub fn contract_exposure(gamma: f64, open_interest: u64, spot: f64) -> f64 {
    gamma * open_interest as f64 * CONTRACT_MULTIPLIER * spot * spot * ONE_PERCENT_MOVE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn contract(side: OptionSide, strike: f64, iv: Option<f64>, oi: u64, days: i64) -> OptionContract {
        OptionContract {
            strike,
            implied_volatility: iv,
            open_interest: oi,
            side,
            expiration: as_of() + chrono::Duration::days(days),
        }
    }

    fn aggregator() -> ExposureAggregator {
        ExposureAggregator::new(0.04, as_of())
    }

    fn sample_chain() -> Vec<OptionContract> {
        vec![
            contract(OptionSide::Call, 95.0, Some(0.25), 120, 14),
            contract(OptionSide::Put, 95.0, Some(0.30), 400, 14),
            contract(OptionSide::Call, 100.0, Some(0.22), 800, 14),
            contract(OptionSide::Put, 100.0, Some(0.24), 300, 45),
            contract(OptionSide::Call, 105.0, Some(0.20), 900, 45),
            contract(OptionSide::Put, 90.0, Some(0.35), 1000, 45),
        ]
    }

    #[test]
    fn single_call_contributes_positive_exposure() {
        let chain = vec![contract(OptionSide::Call, 100.0, Some(0.2), 50, 30)];
        let out = aggregator().aggregate(&chain, 100.0);

        let expected = contract_exposure(gamma(100.0, 100.0, 30.0 / 365.0, 0.04, 0.2), 50, 100.0);
        assert!(out.total_gex > 0.0);
        assert!((out.total_gex - expected).abs() < 1e-9);
        assert_eq!(out.by_strike.len(), 1);
        assert!((out.by_strike[&Strike(100.0)] - expected).abs() < 1e-9);
    }

    #[test]
    fn put_is_negative_in_map_but_subtracted_from_total() {
        let chain = vec![contract(OptionSide::Put, 100.0, Some(0.2), 50, 30)];
        let out = aggregator().aggregate(&chain, 100.0);

        let magnitude = contract_exposure(gamma(100.0, 100.0, 30.0 / 365.0, 0.04, 0.2), 50, 100.0);
        assert!((out.by_strike[&Strike(100.0)] + magnitude).abs() < 1e-9);
        assert!((out.total_gex - magnitude).abs() < 1e-9);
        assert_eq!(out.stats.puts, 1);
    }

    #[test]
    fn call_and_put_at_same_strike_net_in_map() {
        let chain = vec![
            contract(OptionSide::Call, 100.0, Some(0.2), 50, 30),
            contract(OptionSide::Put, 100.0, Some(0.2), 50, 30),
        ];
        let out = aggregator().aggregate(&chain, 100.0);
        assert!(out.by_strike[&Strike(100.0)].abs() < 1e-9);
        assert!(out.total_gex > 0.0);
    }

    #[test]
    fn expired_and_same_day_contracts_are_skipped() {
        let chain = vec![
            contract(OptionSide::Call, 100.0, Some(0.2), 50, 0),
            contract(OptionSide::Call, 100.0, Some(0.2), 50, -3),
        ];
        let out = aggregator().aggregate(&chain, 100.0);
        assert_eq!(out.total_gex, 0.0);
        assert!(out.by_strike.is_empty());
        assert_eq!(out.stats.skipped_expired, 2);
    }

    #[test]
    fn invalid_iv_contributes_nothing() {
        let base = sample_chain();
        let before = aggregator().aggregate(&base, 100.0);

        for bad_iv in [None, Some(0.0), Some(-0.4), Some(f64::NAN)] {
            let mut chain = base.clone();
            chain.push(contract(OptionSide::Call, 100.0, bad_iv, 10_000, 14));
            chain.push(contract(OptionSide::Put, 110.0, bad_iv, 10_000, 14));
            let after = aggregator().aggregate(&chain, 100.0);

            assert_eq!(after.total_gex, before.total_gex);
            assert_eq!(after.by_strike, before.by_strike);
            assert_eq!(after.stats.skipped_bad_iv, 2);
        }
    }

    #[test]
    fn zero_gamma_contracts_leave_no_map_entry() {
        // Far enough out of the money that the density underflows to zero.
        let chain = vec![contract(OptionSide::Call, 100_000.0, Some(0.05), 10, 7)];
        let out = aggregator().aggregate(&chain, 100.0);
        assert!(out.by_strike.is_empty());
        assert_eq!(out.stats.skipped_zero_gamma, 1);
    }

    #[test]
    fn aggregation_is_order_independent() {
        let chain = sample_chain();
        let forward = aggregator().aggregate(&chain, 101.0);

        let mut reversed = chain.clone();
        reversed.reverse();
        let backward = aggregator().aggregate(&reversed, 101.0);

        let mut rotated = chain;
        rotated.rotate_left(2);
        let shuffled = aggregator().aggregate(&rotated, 101.0);

        for other in [&backward, &shuffled] {
            assert!((forward.total_gex - other.total_gex).abs() < 1e-6);
            assert_eq!(forward.by_strike.len(), other.by_strike.len());
            for (k, v) in &forward.by_strike {
                assert!((v - other.by_strike[k]).abs() < 1e-6, "strike {}", k.value());
            }
        }
    }

    #[test]
    fn time_to_expiry_uses_calendar_days() {
        let agg = aggregator();
        assert!((agg.time_to_expiry(as_of() + chrono::Duration::days(73)) - 0.2).abs() < 1e-12);
        assert_eq!(agg.time_to_expiry(as_of()), 0.0);
    }
}
