use async_trait::async_trait;

use crate::db::models::{DetailRow, PriceRow, SummaryRow};
use crate::error::Result;
use crate::types::WatchlistEntry;

/// Read-only access to previously persisted total exposure per ticker.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn historical_totals(&self, ticker_id: i64) -> Result<Vec<f64>>;
}

/// Query side of the SQLite store: watchlist, history, and API reads.
#[derive(Clone)]
pub struct DbReader {
    pool: sqlx::SqlitePool,
}

impl DbReader {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn watchlist(&self) -> Result<Vec<WatchlistEntry>> {
        let rows = sqlx::query_as::<_, WatchlistEntry>("SELECT id, ticker FROM watchlist ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn find_ticker(&self, ticker: &str) -> Result<Option<WatchlistEntry>> {
        let row = sqlx::query_as::<_, WatchlistEntry>(
            "SELECT id, ticker FROM watchlist WHERE ticker = ?",
        )
        .bind(ticker.to_ascii_uppercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Most recent summaries first.
    pub async fn summary_history(&self, ticker_id: i64, limit: i64) -> Result<Vec<SummaryRow>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT ticker_id, date, total_gex, flip_price, percentile
            FROM summaries
            WHERE ticker_id = ?
            ORDER BY date DESC
            LIMIT ?
            "#,
        )
        .bind(ticker_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn latest_summary(&self, ticker_id: i64) -> Result<Option<SummaryRow>> {
        Ok(self.summary_history(ticker_id, 1).await?.into_iter().next())
    }

    pub async fn latest_summary_date(&self) -> Result<Option<String>> {
        let date: Option<String> = sqlx::query_scalar("SELECT MAX(date) FROM summaries")
            .fetch_one(&self.pool)
            .await?;
        Ok(date)
    }

    pub async fn latest_price(&self, ticker_id: i64) -> Result<Option<PriceRow>> {
        let row = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT ticker_id, date, price
            FROM prices
            WHERE ticker_id = ?
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(ticker_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Strike rows for `date`, or for the ticker's most recent date when `None`.
    pub async fn strikes(&self, ticker_id: i64, date: Option<&str>) -> Result<Vec<DetailRow>> {
        let date = match date {
            Some(d) => d.to_string(),
            None => {
                let latest: Option<String> =
                    sqlx::query_scalar("SELECT MAX(date) FROM details WHERE ticker_id = ?")
                        .bind(ticker_id)
                        .fetch_one(&self.pool)
                        .await?;
                match latest {
                    Some(d) => d,
                    None => return Ok(Vec::new()),
                }
            }
        };

        let rows = sqlx::query_as::<_, DetailRow>(
            r#"
            SELECT ticker_id, date, strike, net_gex
            FROM details
            WHERE ticker_id = ? AND date = ?
            ORDER BY strike
            "#,
        )
        .bind(ticker_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl HistoryStore for DbReader {
    async fn historical_totals(&self, ticker_id: i64) -> Result<Vec<f64>> {
        let totals: Vec<Option<f64>> =
            sqlx::query_scalar("SELECT total_gex FROM summaries WHERE ticker_id = ?")
                .bind(ticker_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(totals.into_iter().flatten().collect())
    }
}
