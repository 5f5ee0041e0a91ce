use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("provider denied authorization: {0}")]
    ProviderDenied(String),

    #[error("state does not match")]
    StateMismatch,

    #[error("missing query parameter: {0}")]
    MissingParameter(&'static str),

    #[error("token exchange failed")]
    TokenExchangeFailed,

    #[error("no credentials found")]
    NoCredentials,

    #[error("missing access token")]
    MissingToken,

    #[error("failed to fetch contacts (upstream status {status})")]
    FetchFailed { status: StatusCode },

    #[error("invalid timestamp in field '{field}'")]
    InvalidTimestamp { field: &'static str },

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ProviderDenied(_)
            | AppError::StateMismatch
            | AppError::MissingParameter(_)
            | AppError::TokenExchangeFailed
            | AppError::NoCredentials
            | AppError::MissingToken
            | AppError::InvalidTimestamp { .. } => StatusCode::BAD_REQUEST,
            AppError::FetchFailed { status } => *status,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, code, msg) = match &self {
            AppError::ProviderDenied(reason) => (
                "authorization_error",
                "provider_denied",
                reason.clone(),
            ),
            AppError::StateMismatch => (
                "authorization_error",
                "state_mismatch",
                "State does not match.".to_string(),
            ),
            AppError::MissingParameter(name) => (
                "invalid_request_error",
                "missing_parameter",
                format!("missing query parameter '{}'", name),
            ),
            AppError::TokenExchangeFailed => (
                "authorization_error",
                "token_exchange_failed",
                "token exchange with provider failed".to_string(),
            ),
            AppError::NoCredentials => (
                "invalid_request_error",
                "no_credentials",
                "No credentials found.".to_string(),
            ),
            AppError::MissingToken => (
                "invalid_request_error",
                "missing_token",
                "Missing access token".to_string(),
            ),
            AppError::FetchFailed { .. } => (
                "upstream_error",
                "fetch_failed",
                "Failed to fetch contacts".to_string(),
            ),
            AppError::InvalidTimestamp { field } => (
                "upstream_error",
                "invalid_timestamp",
                format!("record has a missing or malformed '{}' timestamp", field),
            ),
            AppError::Upstream(e) => ("upstream_error", "upstream_failed", e.clone()),
            AppError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
