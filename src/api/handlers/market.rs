use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::state::AppState;
use crate::error::{AppError, AppResult};
use crate::venues::market::to_venue_symbol;
use crate::venues::Venue;

fn parse_venue(s: &str) -> AppResult<Venue> {
    match s.to_lowercase().as_str() {
        "upbit" => Ok(Venue::UpbitLike),
        "binance" => Ok(Venue::BinanceLike),
        _ => Err(AppError::BadInput("exchange".to_string())),
    }
}

#[derive(Deserialize)]
pub struct PriceQuery {
    exchange: String,
    symbol: String,
}

pub async fn prices(State(state): State<AppState>, Query(q): Query<PriceQuery>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&q.exchange)?;
    let market_symbol = to_venue_symbol(venue, &q.symbol);
    let price = state
        .gateway
        .market
        .fetch_price(venue, &market_symbol)
        .await
        .map_err(|e| AppError::VenueError(502, e.to_string()))?;
    Ok(Json(json!({ "symbol": q.symbol, "price": price })))
}

#[derive(Deserialize)]
pub struct CandlesQuery {
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

pub async fn candles(State(state): State<AppState>, Query(q): Query<CandlesQuery>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&q.exchange)?;
    let market_symbol = to_venue_symbol(venue, &q.symbol);
    let candles = state
        .gateway
        .market
        .fetch_candles(venue, &market_symbol, &q.interval, q.count)
        .await
        .map_err(|e| AppError::VenueError(502, e.to_string()))?;
    Ok(Json(json!({ "candles": candles })))
}

#[derive(Deserialize)]
pub struct OrderbookQuery {
    exchange: String,
    symbol: String,
}

pub async fn orderbook(State(state): State<AppState>, Query(q): Query<OrderbookQuery>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&q.exchange)?;
    let market_symbol = to_venue_symbol(venue, &q.symbol);
    let snapshot = state
        .gateway
        .market
        .fetch_orderbook(venue, &market_symbol)
        .await
        .map_err(|e| AppError::VenueError(502, e.to_string()))?;
    Ok(Json(json!(snapshot)))
}
