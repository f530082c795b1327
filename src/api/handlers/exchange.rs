use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::api::middleware::AuthUser;
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
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody {
    exchange: String,
    symbol: String,
    side: String,
    order_type: String,
    quantity: f64,
    price: Option<f64>,
}

pub async fn place_order(State(state): State<AppState>, user: AuthUser, Json(body): Json<PlaceOrderBody>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&body.exchange)?;
    let result = state
        .gateway
        .exchange_place_order(&user.principal_id, venue, &body.symbol, &body.side, &body.order_type, body.quantity, body.price)
        .await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderBody {
    exchange: String,
    order_id: String,
}

pub async fn cancel_order(State(state): State<AppState>, user: AuthUser, Json(body): Json<CancelOrderBody>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&body.exchange)?;
    let result = state.gateway.exchange_cancel_order(&user.principal_id, venue, &body.order_id).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct VenueQuery {
    exchange: String,
}

pub async fn balance(State(state): State<AppState>, user: AuthUser, Query(q): Query<VenueQuery>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&q.exchange)?;
    let result = state.gateway.exchange_balance(&user.principal_id, venue).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct OpenOrdersQuery {
    exchange: String,
    symbol: Option<String>,
}

pub async fn open_orders(State(state): State<AppState>, user: AuthUser, Query(q): Query<OpenOrdersQuery>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&q.exchange)?;
    let result = state.gateway.exchange_open_orders(&user.principal_id, venue, q.symbol.as_deref()).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn history(State(state): State<AppState>, user: AuthUser, Query(q): Query<HistoryQuery>) -> AppResult<Json<Value>> {
    let result = state.gateway.exchange_history(&user.principal_id, q.limit).await?;
    Ok(Json(result))
}
