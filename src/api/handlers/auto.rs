use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::AuthUser;
use crate::api::state::AppState;
use crate::db;
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
pub struct AutoConfigPatch {
    pub symbols: Option<String>,
    pub max_position_pct: Option<f64>,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub min_confidence: Option<f64>,
    pub max_daily_trades: Option<i64>,
    pub max_consecutive_losses: Option<i64>,
}

#[derive(Deserialize)]
pub struct EnableBody {
    exchange: String,
    config: Option<AutoConfigPatch>,
}

pub async fn enable(State(state): State<AppState>, user: AuthUser, Json(body): Json<EnableBody>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&body.exchange)?;

    if let Some(patch) = body.config {
        let mut config = db::auto_trade::get(&state.gateway.db, &user.principal_id, venue)
            .await
            .map_err(AppError::from)?
            .unwrap_or_default();
        if let Some(v) = patch.symbols {
            config.symbols = v;
        }
        if let Some(v) = patch.max_position_pct {
            config.max_position_pct = v;
        }
        if let Some(v) = patch.stop_loss_pct {
            config.stop_loss_pct = v;
        }
        if let Some(v) = patch.take_profit_pct {
            config.take_profit_pct = v;
        }
        if let Some(v) = patch.min_confidence {
            config.min_confidence = v;
        }
        if let Some(v) = patch.max_daily_trades {
            config.max_daily_trades = v;
        }
        if let Some(v) = patch.max_consecutive_losses {
            config.max_consecutive_losses = v;
        }
        db::auto_trade::upsert(&state.gateway.db, &user.principal_id, venue, &config)
            .await
            .map_err(AppError::from)?;
    }

    state.scheduler.enable(&user.principal_id, venue).await?;
    Ok(Json(json!({ "exchange": body.exchange, "enabled": true })))
}

#[derive(Deserialize)]
pub struct DisableBody {
    exchange: String,
}

pub async fn disable(State(state): State<AppState>, user: AuthUser, Json(body): Json<DisableBody>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&body.exchange)?;
    state.scheduler.disable(&user.principal_id, venue).await?;
    Ok(Json(json!({ "exchange": body.exchange, "enabled": false })))
}

#[derive(Deserialize)]
pub struct StatusQuery {
    exchange: String,
}

pub async fn status(State(state): State<AppState>, user: AuthUser, Query(q): Query<StatusQuery>) -> AppResult<Json<Value>> {
    let venue = parse_venue(&q.exchange)?;
    let config = db::auto_trade::get(&state.gateway.db, &user.principal_id, venue)
        .await
        .map_err(AppError::from)?
        .unwrap_or_default();
    let running = state.scheduler.is_running(&user.principal_id, venue).await;
    Ok(Json(json!({ "exchange": q.exchange, "running": running, "config": config })))
}
