use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::dex::orderbook::OrderSide;
use crate::error::{AppError, AppResult};

pub async fn summary(State(state): State<AppState>) -> Json<Value> {
    Json(state.gateway.status_summary())
}

pub async fn pools(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "pools": state.gateway.dex_pool_summaries() }))
}

pub async fn tokens(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "tokens": state.gateway.dex_tokens() }))
}

#[derive(Deserialize)]
pub struct PoolQuery {
    pool: String,
}

pub async fn orderbook(State(state): State<AppState>, Query(q): Query<PoolQuery>) -> AppResult<Json<Value>> {
    let snapshot = state.gateway.dex_order_book(&q.pool)?;
    Ok(Json(json!(snapshot)))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    limit: i64,
}

fn default_history_limit() -> i64 {
    50
}

pub async fn history(State(state): State<AppState>, Query(q): Query<HistoryQuery>) -> AppResult<Json<Value>> {
    let rows = state.gateway.dex_history(q.limit).await?;
    Ok(Json(json!({ "swaps": rows })))
}

pub async fn balances(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let balances = state.gateway.dex_balances(&user.principal_id).await?;
    let out: Vec<Value> = balances
        .into_iter()
        .map(|(token, entry)| json!({ "token": token, "balance": entry.balance.to_string(), "locked": entry.locked.to_string() }))
        .collect();
    Ok(Json(json!({ "balances": out })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapBody {
    pool_id: String,
    token_in: String,
    amount: String,
}

pub async fn swap(State(state): State<AppState>, user: AuthUser, Json(body): Json<SwapBody>) -> AppResult<Json<Value>> {
    let amount: u128 = body.amount.parse().map_err(|_| AppError::BadInput("amount".to_string()))?;
    let result = state.gateway.dex_swap(&user.principal_id, &body.pool_id, &body.token_in, amount).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityBody {
    pool_id: String,
    amount_a: String,
    amount_b: String,
}

pub async fn liquidity(State(state): State<AppState>, user: AuthUser, Json(body): Json<LiquidityBody>) -> AppResult<Json<Value>> {
    let amount_a: u128 = body.amount_a.parse().map_err(|_| AppError::BadInput("amountA".to_string()))?;
    let amount_b: u128 = body.amount_b.parse().map_err(|_| AppError::BadInput("amountB".to_string()))?;
    let result = state.gateway.dex_add_liquidity(&user.principal_id, &body.pool_id, amount_a, amount_b).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody {
    pool_id: String,
    side: String,
    price: f64,
    amount: f64,
}

pub async fn place_order(State(state): State<AppState>, user: AuthUser, Json(body): Json<PlaceOrderBody>) -> AppResult<Json<Value>> {
    let side = match body.side.to_lowercase().as_str() {
        "buy" => OrderSide::Buy,
        "sell" => OrderSide::Sell,
        _ => return Err(AppError::BadInput("side".to_string())),
    };
    let result = state.gateway.dex_place_order(&user.principal_id, &body.pool_id, side, body.price, body.amount).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderBody {
    pool_id: String,
    order_id: String,
}

pub async fn cancel_order(State(state): State<AppState>, user: AuthUser, Json(body): Json<CancelOrderBody>) -> AppResult<Json<Value>> {
    let result = state.gateway.dex_cancel_order(&user.principal_id, &body.pool_id, &body.order_id).await?;
    Ok(Json(result))
}
