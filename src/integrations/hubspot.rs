//! HubSpot CRM integration: OAuth client settings, contact fetch and
//! normalization of contact records into [`IntegrationItem`]s.

use std::sync::Arc;

use axum::response::Html;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::errors::AppError;
use crate::models::IntegrationItem;
use crate::oauth::{CallbackParams, Credential, OAuthFlow};
use crate::store::KvStore;

pub const PROVIDER: &str = "hubspot";
pub const AUTHORIZE_URL: &str = "https://app.hubspot.com/oauth/authorize";
pub const API_BASE_URL: &str = "https://api.hubapi.com";
pub const SCOPES: &[&str] = &["oauth", "crm.objects.contacts.read"];
pub const CONTACT_ITEM_TYPE: &str = "hubspot_contact";

const TOKEN_PATH: &str = "/oauth/v1/token";
const CONTACTS_PATH: &str = "/crm/v3/objects/contacts";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/integrations/hubspot/oauth2callback";

/// Client settings for HubSpot with the token endpoint rooted at `api_base_url`.
pub fn provider_config(client_id: String, client_secret: String, api_base_url: &str) -> ProviderConfig {
    ProviderConfig {
        name: PROVIDER.to_string(),
        client_id,
        client_secret,
        authorize_url: AUTHORIZE_URL.to_string(),
        token_url: format!("{}{}", api_base_url.trim_end_matches('/'), TOKEN_PATH),
        redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
    }
}

#[derive(Clone)]
pub struct HubspotIntegration {
    oauth: OAuthFlow,
    http: reqwest::Client,
    api_base_url: String,
}

impl HubspotIntegration {
    pub fn new(
        provider: ProviderConfig,
        api_base_url: &str,
        store: Arc<dyn KvStore>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            oauth: OAuthFlow::new(provider, store, http.clone()),
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn authorize(&self, user_id: &str, org_id: &str) -> Result<String, AppError> {
        self.oauth.authorize(user_id, org_id).await
    }

    pub async fn oauth2callback(&self, params: CallbackParams) -> Result<Html<&'static str>, AppError> {
        self.oauth.oauth2callback(params).await
    }

    pub async fn get_credentials(&self, user_id: &str, org_id: &str) -> Result<Credential, AppError> {
        self.oauth.get_credentials(user_id, org_id).await
    }

    /// Fetch contacts with a serialized credential and normalize them, in
    /// the order HubSpot returned them.
    pub async fn get_items(&self, credentials: &str) -> Result<Vec<IntegrationItem>, AppError> {
        let access_token = serde_json::from_str::<Value>(credentials)
            .ok()
            .and_then(Credential::from_value)
            .and_then(|c| c.access_token().map(String::from))
            .ok_or(AppError::MissingToken)?;

        let url = format!("{}{}", self.api_base_url, CONTACTS_PATH);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("HubSpot contacts request failed: {}", e);
                AppError::Upstream(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "HubSpot contacts fetch failed");
            return Err(AppError::FetchFailed { status });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("invalid contacts payload: {}", e)))?;

        let records = body
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let items = records
            .iter()
            .map(normalize_contact)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(count = items.len(), "fetched HubSpot contacts");
        Ok(items)
    }
}

/// Map one contact record into an [`IntegrationItem`].
///
/// Both timestamps are required; a record without them fails the whole
/// fetch with `InvalidTimestamp`.
pub fn normalize_contact(record: &Value) -> Result<IntegrationItem, AppError> {
    let properties = record.get("properties").unwrap_or(&Value::Null);
    let property = |key: &str| properties.get(key).and_then(Value::as_str).unwrap_or("");

    let id = match record.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    Ok(IntegrationItem {
        id,
        item_type: CONTACT_ITEM_TYPE.to_string(),
        name: format!("{} {}", property("firstname"), property("lastname"))
            .trim()
            .to_string(),
        creation_time: parse_timestamp(properties, "createdate")?,
        last_modified_time: parse_timestamp(properties, "lastmodifieddate")?,
        url: None,
    })
}

fn parse_timestamp(properties: &Value, field: &'static str) -> Result<DateTime<Utc>, AppError> {
    let raw = properties
        .get(field)
        .and_then(Value::as_str)
        .ok_or(AppError::InvalidTimestamp { field })?;

    let normalized = match raw.strip_suffix('Z') {
        Some(prefix) => format!("{}+00:00", prefix),
        None => raw.to_string(),
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(ts.with_timezone(&Utc));
    }
    // no offset at all: read as UTC
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| AppError::InvalidTimestamp { field })
}
