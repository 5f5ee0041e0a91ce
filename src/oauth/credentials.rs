use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::store::KvStore;

/// Credential TTL (10 minutes)
pub const CREDENTIALS_TTL_SECS: u64 = 600;

/// Token payload exactly as the provider returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(Map<String, Value>);

impl Credential {
    /// Only non-empty JSON objects are credentials.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) if !map.is_empty() => Some(Self(map)),
            _ => None,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.0
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(&self.0).map_err(|e| AppError::Internal(e.into()))
    }
}

/// Transient credential slot per (org, user). Reads are destructive.
#[derive(Clone)]
pub struct CredentialStore {
    provider: String,
    store: Arc<dyn KvStore>,
}

impl CredentialStore {
    pub fn new(provider: impl Into<String>, store: Arc<dyn KvStore>) -> Self {
        Self {
            provider: provider.into(),
            store,
        }
    }

    pub fn key(&self, org_id: &str, user_id: &str) -> String {
        format!("{}_credentials:{}:{}", self.provider, org_id, user_id)
    }

    pub async fn save(
        &self,
        user_id: &str,
        org_id: &str,
        credential: &Credential,
    ) -> Result<(), AppError> {
        self.store
            .set(
                &self.key(org_id, user_id),
                &credential.to_json()?,
                CREDENTIALS_TTL_SECS,
            )
            .await?;
        Ok(())
    }

    /// Read the credential and delete it. Until a new OAuth flow completes,
    /// any further call fails with `NoCredentials`.
    pub async fn take(&self, user_id: &str, org_id: &str) -> Result<Credential, AppError> {
        let key = self.key(org_id, user_id);
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or(AppError::NoCredentials)?;

        let credential = serde_json::from_str::<Value>(&raw)
            .ok()
            .and_then(Credential::from_value)
            .ok_or_else(|| {
                tracing::warn!(
                    provider = %self.provider,
                    user_id = %user_id,
                    org_id = %org_id,
                    "stored credential is empty or malformed"
                );
                AppError::NoCredentials
            })?;

        self.store.delete(&key).await?;
        Ok(credential)
    }
}
