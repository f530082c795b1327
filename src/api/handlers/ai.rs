use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::state::AppState;
use crate::error::{AppError, AppResult};
use crate::venues::Venue;

fn parse_venue(s: &str) -> AppResult<Venue> {
    match s.to_lowercase().as_str() {
        "upbit" => Ok(Venue::UpbitLike),
        "binance" => Ok(Venue::BinanceLike),
        _ => Err(AppError::BadInput("exchange".to_string())),
    }
}

#[derive(Deserialize)]
pub struct AnalyzeQuery {
    exchange: String,
    symbol: String,
    #[serde(default = "default_interval")]
    interval: String,
    #[serde(default = "default_count")]
    count: u32,
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_count() -> u32 {
    200
}

pub async fn analyze(State(state): State<AppState>, Query(q): Query<AnalyzeQuery>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&q.exchange)?;
    let body = state.gateway.ai_analyze(venue, &q.symbol, &q.interval, q.count).await?;
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct BacktestQuery {
    exchange: String,
    symbol: String,
    #[serde(default = "default_interval")]
    interval: String,
    #[serde(default = "default_count")]
    count: u32,
    #[serde(default = "default_capital")]
    capital: f64,
}

fn default_capital() -> f64 {
    10_000.0
}

pub async fn backtest(State(state): State<AppState>, Query(q): Query<BacktestQuery>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&q.exchange)?;
    let body = state.gateway.ai_backtest(venue, &q.symbol, &q.interval, q.count, q.capital).await?;
    Ok(Json(body))
}

#[derive(Deserialize)]
pub struct MultiAnalyzeQuery {
    exchange: String,
    symbols: String,
    #[serde(default = "default_interval")]
    interval: String,
    #[serde(default = "default_count")]
    count: u32,
}

pub async fn multi_analyze(State(state): State<AppState>, Query(q): Query<MultiAnalyzeQuery>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&q.exchange)?;
    let symbols: Vec<String> = q.symbols.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    let body = state.gateway.ai_multi_analyze(venue, &symbols, &q.interval, q.count).await?;
    Ok(Json(body))
}
