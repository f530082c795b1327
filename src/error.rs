use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Typed error kinds, replacing substring-sniffed errors.
///
/// Internal layers (`dex`, `risk`, `ai`, `venues`, `executor`, `vault`, `db`)
/// mostly return `anyhow::Result`; `AppError` is the vocabulary the
/// gateway and transport edge use to carry a *kind* through to the HTTP
/// status mapping, done exactly once here.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("authentication required")]
    AuthRequired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0} not found")]
    NotFound(String),
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    #[error("swap would produce zero output")]
    ZeroOutput,
    #[error("rate limited, retry after {0}s")]
    RateLimited(u64),
    #[error("blocked: {0}")]
    SafetyBlocked(String),
    #[error("venue error {0}: {1}")]
    VenueError(u16, String),
    #[error("request timed out")]
    Timeout,
    #[error("{0} already exists")]
    Conflict(String),
    #[error("invalid input: {0}")]
    BadInput(String),
    #[error("cryptographic operation failed")]
    Cryptographic,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Truncate an error for storage onto a `VenueOrder.error` column (≤500 chars).
    pub fn truncated(&self) -> String {
        let s = self.to_string();
        if s.len() > 500 {
            s.chars().take(500).collect()
        } else {
            s
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Internal(format!("store error: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::AuthRequired | AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, json!({ "error": self.to_string() }))
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": self.to_string() })),
            AppError::InsufficientBalance
            | AppError::InsufficientLiquidity
            | AppError::ZeroOutput
            | AppError::BadInput(_) => {
                (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() }))
            }
            AppError::RateLimited(retry_after) => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": self.to_string(), "retryAfter": retry_after }),
            ),
            AppError::SafetyBlocked(_) => {
                (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() }))
            }
            AppError::VenueError(code, _) => {
                let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY);
                (status, json!({ "error": self.to_string() }))
            }
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, json!({ "error": self.to_string() })),
            AppError::Conflict(_) => (StatusCode::CONFLICT, json!({ "error": self.to_string() })),
            AppError::Cryptographic | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
