use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::auth::{create_jwt, hash_password, verify_password};
use crate::api::state::AppState;
use crate::error::{AppError, AppResult};

#[derive(Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginBody {
    pub email_or_username: String,
    pub password: String,
}

#[derive(Serialize)]
struct AuthResponse {
    principal: crate::db::users::Principal,
    token: String,
}

pub async fn register(State(state): State<AppState>, Json(body): Json<RegisterBody>) -> AppResult<Json<Value>> {
    if body.password.len() < 6 {
        return Err(AppError::BadInput("password must be at least 6 characters".to_string()));
    }
    let hash = hash_password(&body.password).map_err(|e| AppError::Internal(e.to_string()))?;
    let principal = state.gateway.register_principal(&body.email, &body.username, &hash).await?;

    let (token, expires_at) = create_jwt(&principal.id, &state.gateway.jwt_secret).map_err(|e| AppError::Internal(e.to_string()))?;
    state.gateway.record_session(&token, &principal.id, expires_at).await?;

    Ok(Json(json!(AuthResponse { principal, token })))
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> AppResult<Json<Value>> {
    let (principal, password_hash) = state
        .gateway
        .find_credentials(&body.email_or_username)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&body.password, &password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    state.gateway.touch_last_login(&principal.id).await?;
    let (token, expires_at) = create_jwt(&principal.id, &state.gateway.jwt_secret).map_err(|e| AppError::Internal(e.to_string()))?;
    state.gateway.record_session(&token, &principal.id, expires_at).await?;

    Ok(Json(json!(AuthResponse { principal, token })))
}
