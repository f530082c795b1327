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
pub struct SaveKeysBody {
    exchange: String,
    access_key: String,
    secret_key: String,
}

pub async fn save_api_keys(State(state): State<AppState>, user: AuthUser, Json(body): Json<SaveKeysBody>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&body.exchange)?;
    let result = state
        .gateway
        .settings_save_api_keys(&user.principal_id, venue, &body.access_key, &body.secret_key)
        .await?;
    // Rotating a key invalidates any running auto-trade loop built on the
    // old credentials; the operator must re-enable explicitly.
    state.scheduler.disable(&user.principal_id, venue).await.ok();
    Ok(Json(result))
}

pub async fn list_api_keys(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Value>> {
    let result = state.gateway.settings_list_api_keys(&user.principal_id).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct DeleteKeysQuery {
    exchange: String,
}

pub async fn delete_api_keys(State(state): State<AppState>, user: AuthUser, Query(q): Query<DeleteKeysQuery>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&q.exchange)?;
    let result = state.gateway.settings_delete_api_keys(&user.principal_id, venue).await?;
    state.scheduler.disable(&user.principal_id, venue).await.ok();
    Ok(Json(result))
}
