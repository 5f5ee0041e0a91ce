use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    Form, Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::IntegrationItem;
use crate::oauth::{CallbackParams, Credential};
use crate::AppState;

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserOrgParams {
    pub user_id: String,
    pub org_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoadParams {
    /// Serialized credential as returned by `/credentials`.
    pub credentials: String,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /integrations/hubspot/authorize — consent URL for the popup
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserOrgParams>,
) -> Result<Json<String>, AppError> {
    let url = state
        .hubspot
        .authorize(&params.user_id, &params.org_id)
        .await?;
    Ok(Json(url))
}

/// POST /integrations/hubspot/authorize — same as GET, form-encoded
pub async fn authorize_form(
    State(state): State<Arc<AppState>>,
    Form(params): Form<UserOrgParams>,
) -> Result<Json<String>, AppError> {
    let url = state
        .hubspot
        .authorize(&params.user_id, &params.org_id)
        .await?;
    Ok(Json(url))
}

/// GET /integrations/hubspot/oauth2callback
pub async fn oauth2callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<&'static str>, AppError> {
    state.hubspot.oauth2callback(params).await
}

/// POST /integrations/hubspot/credentials — one-shot credential pickup
pub async fn get_credentials(
    State(state): State<Arc<AppState>>,
    Form(params): Form<UserOrgParams>,
) -> Result<Json<Credential>, AppError> {
    let credential = state
        .hubspot
        .get_credentials(&params.user_id, &params.org_id)
        .await?;
    Ok(Json(credential))
}

/// POST /integrations/hubspot/load — normalized contacts
pub async fn load_items(
    State(state): State<Arc<AppState>>,
    Form(params): Form<LoadParams>,
) -> Result<Json<Vec<IntegrationItem>>, AppError> {
    let items = state.hubspot.get_items(&params.credentials).await?;
    Ok(Json(items))
}

/// GET /readyz — fails with 503 while the store is unreachable
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.store.ping().await.map_err(|e| {
        tracing::warn!("readiness check failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}
