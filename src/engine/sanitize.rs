use serde::Serialize;

use crate::db::models::{DetailRow, PriceRow, SummaryRow};
use crate::types::{GammaExposureSummary, PriceRecord, StrikeExposureRecord, TickerResult};

/// Converts a computed value into its persisted shape, replacing every
/// non-finite float with `None` (SQL NULL / JSON null) at that leaf only.
pub trait Sanitize {
    type Clean;

    fn sanitize(&self) -> Self::Clean;
}

/// Finite floats pass through; NaN and ±inf become the no-value marker.
pub fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

impl Sanitize for f64 {
    type Clean = Option<f64>;

    fn sanitize(&self) -> Option<f64> {
        finite(*self)
    }
}

impl<T: Sanitize> Sanitize for Vec<T> {
    type Clean = Vec<T::Clean>;

    fn sanitize(&self) -> Self::Clean {
        self.iter().map(Sanitize::sanitize).collect()
    }
}

impl Sanitize for GammaExposureSummary {
    type Clean = SummaryRow;

    fn sanitize(&self) -> SummaryRow {
        SummaryRow {
            ticker_id: self.ticker_id,
            date: self.date.to_string(),
            total_gex: self.total_gex.sanitize(),
            flip_price: self.flip_price.sanitize(),
            percentile: i64::from(self.percentile),
        }
    }
}

impl Sanitize for PriceRecord {
    type Clean = PriceRow;

    fn sanitize(&self) -> PriceRow {
        PriceRow {
            ticker_id: self.ticker_id,
            date: self.date.to_string(),
            price: self.price.sanitize(),
        }
    }
}

impl Sanitize for StrikeExposureRecord {
    type Clean = DetailRow;

    fn sanitize(&self) -> DetailRow {
        DetailRow {
            ticker_id: self.ticker_id,
            date: self.date.to_string(),
            strike: self.strike,
            net_gex: self.net_gex.sanitize(),
        }
    }
}

/// Persisted form of one ticker's results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanResult {
    pub summary: SummaryRow,
    pub price: PriceRow,
    pub strikes: Vec<DetailRow>,
}

impl Sanitize for TickerResult {
    type Clean = CleanResult;

    fn sanitize(&self) -> CleanResult {
        CleanResult {
            summary: self.summary.sanitize(),
            price: self.price.sanitize(),
            strikes: self.strikes.sanitize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn result_with(net: Vec<f64>, flip_price: f64) -> TickerResult {
        TickerResult {
            summary: GammaExposureSummary {
                ticker_id: 3,
                total_gex: 10.0,
                flip_price,
                percentile: 40,
                date: date(),
            },
            price: PriceRecord { ticker_id: 3, price: 99.5, date: date() },
            strikes: net
                .into_iter()
                .enumerate()
                .map(|(i, net_gex)| StrikeExposureRecord {
                    ticker_id: 3,
                    strike: 95 + i as i64,
                    net_gex,
                    date: date(),
                })
                .collect(),
        }
    }

    #[test]
    fn finite_values_pass_through() {
        let clean = result_with(vec![1.5, -2.0], 97.0).sanitize();
        assert_eq!(clean.summary.total_gex, Some(10.0));
        assert_eq!(clean.summary.flip_price, Some(97.0));
        assert_eq!(clean.summary.percentile, 40);
        assert_eq!(clean.summary.date, "2026-03-02");
        assert_eq!(clean.price.price, Some(99.5));
        let nets: Vec<Option<f64>> = clean.strikes.iter().map(|s| s.net_gex).collect();
        assert_eq!(nets, vec![Some(1.5), Some(-2.0)]);
    }

    #[test]
    fn non_finite_leaf_is_replaced_and_siblings_untouched() {
        let clean = result_with(vec![1.0, f64::INFINITY, f64::NAN, -3.0], f64::NEG_INFINITY).sanitize();

        assert_eq!(clean.summary.flip_price, None);
        assert_eq!(clean.summary.total_gex, Some(10.0));
        assert_eq!(clean.price.price, Some(99.5));

        let nets: Vec<Option<f64>> = clean.strikes.iter().map(|s| s.net_gex).collect();
        assert_eq!(nets, vec![Some(1.0), None, None, Some(-3.0)]);
        let strikes: Vec<i64> = clean.strikes.iter().map(|s| s.strike).collect();
        assert_eq!(strikes, vec![95, 96, 97, 98]);
    }

    #[test]
    fn clean_result_serializes_markers_as_null() {
        let clean = result_with(vec![f64::INFINITY], 100.0).sanitize();
        let json = serde_json::to_value(&clean).unwrap();
        assert!(json["strikes"][0]["net_gex"].is_null());
        assert_eq!(json["summary"]["flip_price"], 100.0);
    }
}
