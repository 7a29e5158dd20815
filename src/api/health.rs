//! `/health`: database reachability and freshness of the last batch.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::warn;

use crate::api::routes::ApiState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    pub tickers: usize,
    /// Date of the newest persisted summary, if any.
    pub last_run_date: Option<String>,
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let watchlist = state.reader.watchlist().await;
    let last_run_date = state.reader.latest_summary_date().await;

    match (watchlist, last_run_date) {
        (Ok(w), Ok(date)) => Json(HealthResponse {
            status: "ok",
            db_ok: true,
            tickers: w.len(),
            last_run_date: date,
        }),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Health check database error: {e}");
            Json(HealthResponse {
                status: "degraded",
                db_ok: false,
                tickers: 0,
                last_run_date: None,
            })
        }
    }
}
