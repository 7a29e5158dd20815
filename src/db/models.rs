//! Row types for the summaries, prices and details tables.
//! Nullable REAL columns hold the sanitation pass's no-value markers.
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SummaryRow {
    pub ticker_id: i64,
    pub date: String,
    pub total_gex: Option<f64>,
    pub flip_price: Option<f64>,
    pub percentile: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PriceRow {
    pub ticker_id: i64,
    pub date: String,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DetailRow {
    pub ticker_id: i64,
    pub date: String,
    pub strike: i64,
    pub net_gex: Option<f64>,
}
