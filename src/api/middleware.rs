//! Auth extraction for protected routes. Reuses `AppError` directly as the
//! rejection type instead of a parallel `ApiError`, so a failed extraction
//! renders through the same typed HTTP mapping as every other handler error.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use super::state::AppState;
use crate::error::AppError;

pub struct AuthUser {
    pub principal_id: String,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(parts) {
            Some(t) => t,
            None => {
                // WebSocket upgrades can't set custom headers from a browser,
                // so also accept `?token=` on the query string.
                let Query(q) = Query::<TokenQuery>::from_request_parts(parts, state)
                    .await
                    .map_err(|_| AppError::AuthRequired)?;
                q.token.ok_or(AppError::AuthRequired)?
            }
        };

        let claims = super::auth::verify_jwt(&token, &state.gateway.jwt_secret).map_err(|_| AppError::InvalidCredentials)?;

        state.gateway.check_rate_limit(&claims.sub).await?;

        Ok(AuthUser { principal_id: claims.sub })
    }
}
