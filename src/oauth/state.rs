//! CSRF state tokens for the authorization-code flow.
//!
//! A state is bound to one (org, user) pair, lives in the store for
//! [`STATE_TTL_SECS`] and is consumed by the first callback that presents it.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::store::{KvStore, StoreResult};

/// OAuth state TTL (10 minutes)
pub const STATE_TTL_SECS: u64 = 600;

const STATE_TOKEN_BYTES: usize = 32;

/// Payload carried through the provider as the `state` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    pub state: String,
    pub user_id: String,
    pub org_id: String,
}

impl AuthorizationState {
    pub fn new(user_id: &str, org_id: &str) -> Self {
        Self {
            state: generate_token(),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
        }
    }

    pub fn encode(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|e| AppError::Internal(e.into()))
    }

    /// Anything that does not parse is treated as a forged state.
    pub fn decode(encoded: &str) -> Result<Self, AppError> {
        serde_json::from_str(encoded).map_err(|e| {
            tracing::warn!("rejecting unparsable OAuth state: {}", e);
            AppError::StateMismatch
        })
    }
}

/// 32 random bytes from the OS CSPRNG, base64url without padding.
pub fn generate_token() -> String {
    let mut bytes = [0u8; STATE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn tokens_match(presented: &str, saved: &str) -> bool {
    presented.as_bytes().ct_eq(saved.as_bytes()).into()
}

#[derive(Clone)]
pub struct StateManager {
    provider: String,
    store: Arc<dyn KvStore>,
}

impl StateManager {
    pub fn new(provider: impl Into<String>, store: Arc<dyn KvStore>) -> Self {
        Self {
            provider: provider.into(),
            store,
        }
    }

    pub fn key(&self, org_id: &str, user_id: &str) -> String {
        format!("{}_state:{}:{}", self.provider, org_id, user_id)
    }

    /// Create and persist a fresh state for the pair, returning its encoded
    /// form. A pending state for the same pair is overwritten.
    pub async fn issue(&self, user_id: &str, org_id: &str) -> Result<String, AppError> {
        let state = AuthorizationState::new(user_id, org_id);
        let encoded = state.encode()?;
        self.store
            .set(&self.key(org_id, user_id), &encoded, STATE_TTL_SECS)
            .await?;
        tracing::debug!(
            provider = %self.provider,
            user_id = %user_id,
            org_id = %org_id,
            "issued OAuth state"
        );
        Ok(encoded)
    }

    /// Compare a presented state against the stored one without consuming it.
    pub async fn check(&self, state: &AuthorizationState) -> Result<(), AppError> {
        let saved = self
            .store
            .get(&self.key(&state.org_id, &state.user_id))
            .await?;

        let matches = saved
            .as_deref()
            .and_then(|raw| serde_json::from_str::<AuthorizationState>(raw).ok())
            .map(|saved| tokens_match(&state.state, &saved.state))
            .unwrap_or(false);

        if !matches {
            tracing::warn!(
                provider = %self.provider,
                user_id = %state.user_id,
                org_id = %state.org_id,
                "OAuth state mismatch"
            );
            return Err(AppError::StateMismatch);
        }
        Ok(())
    }

    pub async fn consume(&self, user_id: &str, org_id: &str) -> StoreResult<()> {
        self.store.delete(&self.key(org_id, user_id)).await
    }

    /// Validate an encoded state for the given pair and consume it.
    pub async fn validate(
        &self,
        encoded_state: &str,
        org_id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let state = AuthorizationState::decode(encoded_state)?;
        if state.org_id != org_id || state.user_id != user_id {
            tracing::warn!(
                provider = %self.provider,
                user_id = %user_id,
                org_id = %org_id,
                "OAuth state bound to a different user or org"
            );
            return Err(AppError::StateMismatch);
        }
        self.check(&state).await?;
        self.consume(user_id, org_id).await?;
        Ok(())
    }
}
