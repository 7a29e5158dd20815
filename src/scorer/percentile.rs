use tracing::warn;

use crate::config::NEUTRAL_PERCENTILE;
use crate::db::history::HistoryStore;

/// Ranks today's total exposure against the ticker's persisted history.
pub struct PercentileScorer<'a> {
    history: &'a dyn HistoryStore,
}

impl<'a> PercentileScorer<'a> {
    pub fn new(history: &'a dyn HistoryStore) -> Self {
        Self { history }
    }

    /// Percentile of `current` within the stored totals for `ticker_id`.
    /// A history lookup failure degrades to the neutral midpoint.
    pub async fn score(&self, ticker_id: i64, current: f64) -> u8 {
        match self.history.historical_totals(ticker_id).await {
            Ok(values) => percentile_rank(&values, current),
            Err(e) => {
                warn!(ticker_id, "History lookup failed, using neutral percentile: {e}");
                NEUTRAL_PERCENTILE
            }
        }
    }
}

/// Share of `history` at or below `current`, as a truncated 0–100 integer.
/// Empty (or entirely non-finite) history is neutral.
pub fn percentile_rank(history: &[f64], current: f64) -> u8 {
    let finite: Vec<f64> = history.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return NEUTRAL_PERCENTILE;
    }

    let at_or_below = finite.iter().filter(|&&v| v <= current).count();
    (at_or_below * 100 / finite.len()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};

    #[test]
    fn empty_history_is_neutral() {
        assert_eq!(percentile_rank(&[], 123.0), 50);
        assert_eq!(percentile_rank(&[f64::NAN], 123.0), 50);
    }

    #[test]
    fn counts_values_at_or_below() {
        let history = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile_rank(&history, 25.0), 50);
        assert_eq!(percentile_rank(&history, 30.0), 75);
        assert_eq!(percentile_rank(&history, 5.0), 0);
        assert_eq!(percentile_rank(&history, 40.0), 100);
        assert_eq!(percentile_rank(&history, 1e9), 100);
    }

    #[test]
    fn truncates_fractional_ranks() {
        assert_eq!(percentile_rank(&[1.0, 2.0, 3.0], 1.0), 33);
        assert_eq!(percentile_rank(&[1.0, 2.0, 3.0], 2.0), 66);
    }

    #[test]
    fn ignores_non_finite_history() {
        assert_eq!(percentile_rank(&[10.0, f64::NAN, 20.0], 15.0), 50);
    }

    struct FixedHistory(Vec<f64>);

    #[async_trait::async_trait]
    impl HistoryStore for FixedHistory {
        async fn historical_totals(&self, _ticker_id: i64) -> Result<Vec<f64>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenHistory;

    #[async_trait::async_trait]
    impl HistoryStore for BrokenHistory {
        async fn historical_totals(&self, _ticker_id: i64) -> Result<Vec<f64>> {
            Err(AppError::MarketData("store unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn scorer_uses_store_values() {
        let store = FixedHistory(vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(PercentileScorer::new(&store).score(1, 35.0).await, 75);
    }

    #[tokio::test]
    async fn scorer_falls_back_on_store_failure() {
        assert_eq!(PercentileScorer::new(&BrokenHistory).score(1, 35.0).await, 50);
    }
}
