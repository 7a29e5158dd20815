use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::health;
use crate::db::models::{DetailRow, SummaryRow};
use crate::db::DbReader;
use crate::error::AppError;
use crate::types::WatchlistEntry;

#[derive(Clone)]
pub struct ApiState {
    pub reader: DbReader,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tickers", get(get_tickers))
        .route("/tickers/:ticker/summary", get(get_latest_summary))
        .route("/tickers/:ticker/history", get(get_summary_history))
        .route("/tickers/:ticker/strikes", get(get_strikes))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct StrikesQuery {
    /// `YYYY-MM-DD`; latest persisted date when absent.
    pub date: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct TickerResponse {
    pub id: i64,
    pub ticker: String,
    pub date: Option<String>,
    pub price: Option<f64>,
    pub total_gex: Option<f64>,
    pub flip_price: Option<f64>,
    pub percentile: Option<i64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_tickers(State(state): State<ApiState>) -> Result<Json<Vec<TickerResponse>>, AppError> {
    let mut tickers = Vec::new();
    for entry in state.reader.watchlist().await? {
        let summary = state.reader.latest_summary(entry.id).await?;
        let price = state.reader.latest_price(entry.id).await?;
        tickers.push(TickerResponse {
            id: entry.id,
            ticker: entry.ticker,
            date: summary.as_ref().map(|s| s.date.clone()),
            price: price.and_then(|p| p.price),
            total_gex: summary.as_ref().and_then(|s| s.total_gex),
            flip_price: summary.as_ref().and_then(|s| s.flip_price),
            percentile: summary.as_ref().map(|s| s.percentile),
        });
    }
    Ok(Json(tickers))
}

async fn get_latest_summary(
    State(state): State<ApiState>,
    Path(ticker): Path<String>,
) -> Result<Json<SummaryRow>, AppError> {
    let entry = lookup(&state, &ticker).await?;
    state
        .reader
        .latest_summary(entry.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no summary for {}", entry.ticker)))
}

async fn get_summary_history(
    State(state): State<ApiState>,
    Path(ticker): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<SummaryRow>>, AppError> {
    let entry = lookup(&state, &ticker).await?;
    let limit = params.limit.unwrap_or(30).clamp(1, 1000);
    Ok(Json(state.reader.summary_history(entry.id, limit).await?))
}

async fn get_strikes(
    State(state): State<ApiState>,
    Path(ticker): Path<String>,
    Query(params): Query<StrikesQuery>,
) -> Result<Json<Vec<DetailRow>>, AppError> {
    let entry = lookup(&state, &ticker).await?;
    Ok(Json(state.reader.strikes(entry.id, params.date.as_deref()).await?))
}

async fn lookup(state: &ApiState, ticker: &str) -> Result<WatchlistEntry, AppError> {
    state
        .reader
        .find_ticker(ticker)
        .await?
        .ok_or_else(|| AppError::NotInWatchlist(ticker.to_ascii_uppercase()))
}
