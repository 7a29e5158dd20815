pub mod history;
pub mod models;
pub mod writer;

pub use history::{DbReader, HistoryStore};
pub use writer::{DbWriter, PersistenceSink};

use tracing::info;

use crate::error::Result;

/// Opens (creating if needed) the SQLite file and applies embedded migrations.
pub async fn connect(db_path: &str) -> Result<sqlx::SqlitePool> {
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{db_path}?mode=rwc")).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {db_path}");
    Ok(pool)
}

#[cfg(test)]
pub async fn memory_pool() -> sqlx::SqlitePool {
    // One connection: every pooled connection would otherwise get its own empty database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    pool
}
