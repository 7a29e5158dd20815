use async_trait::async_trait;
use tracing::info;

use crate::db::models::{DetailRow, PriceRow, SummaryRow};
use crate::error::Result;

/// Destination for one ticker's sanitized results. The three writes are
/// independent: a failure in one does not undo or prevent the others.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn write_summary(&self, row: &SummaryRow) -> Result<()>;

    async fn write_price(&self, row: &PriceRow) -> Result<()>;

    /// Replaces the ticker's strike rows for `date`; returns rows written.
    async fn write_strikes(&self, ticker_id: i64, date: &str, rows: &[DetailRow]) -> Result<usize>;
}

/// Persists results to SQLite, keyed by (ticker_id, date) so reruns on the
/// same day update instead of duplicating.
#[derive(Clone)]
pub struct DbWriter {
    pool: sqlx::SqlitePool,
}

impl DbWriter {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts tickers missing from the watchlist; returns how many were added.
    pub async fn seed_watchlist(&self, tickers: &[String]) -> Result<u64> {
        let mut added = 0;
        for ticker in tickers {
            added += sqlx::query("INSERT OR IGNORE INTO watchlist (ticker) VALUES (?)")
                .bind(ticker)
                .execute(&self.pool)
                .await?
                .rows_affected();
        }
        if added > 0 {
            info!("Added {added} ticker(s) to the watchlist");
        }
        Ok(added)
    }
}

#[async_trait]
impl PersistenceSink for DbWriter {
    async fn write_summary(&self, row: &SummaryRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO summaries (ticker_id, date, total_gex, flip_price, percentile)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(ticker_id, date) DO UPDATE SET
                total_gex = excluded.total_gex,
                flip_price = excluded.flip_price,
                percentile = excluded.percentile
            "#,
        )
        .bind(row.ticker_id)
        .bind(&row.date)
        .bind(row.total_gex)
        .bind(row.flip_price)
        .bind(row.percentile)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn write_price(&self, row: &PriceRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prices (ticker_id, date, price)
            VALUES (?, ?, ?)
            ON CONFLICT(ticker_id, date) DO UPDATE SET price = excluded.price
            "#,
        )
        .bind(row.ticker_id)
        .bind(&row.date)
        .bind(row.price)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn write_strikes(&self, ticker_id: i64, date: &str, rows: &[DetailRow]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM details WHERE ticker_id = ? AND date = ?")
            .bind(ticker_id)
            .bind(date)
            .execute(&mut *tx)
            .await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO details (ticker_id, date, strike, net_gex)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(ticker_id, date, strike) DO UPDATE SET net_gex = excluded.net_gex
                "#,
            )
            .bind(row.ticker_id)
            .bind(&row.date)
            .bind(row.strike)
            .bind(row.net_gex)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows.len())
    }
}
