use std::sync::Arc;

use axum::response::Html;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::credentials::{Credential, CredentialStore};
use super::state::{AuthorizationState, StateManager};
use crate::config::ProviderConfig;
use crate::errors::AppError;
use crate::store::KvStore;

/// Page served to the consent popup once the credential is stored. It
/// notifies the opener window and closes itself.
pub const CALLBACK_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Authentication Complete</title>
</head>
<body>
    <script>
    if (window.opener) {
        window.opener.postMessage({ success: true }, "*");
    }
    window.close();
    </script>
    <p>You can close this window now.</p>
</body>
</html>
"#;

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Authorization-code flow for one provider: consent URL, callback,
/// token exchange and transient credential storage.
#[derive(Clone)]
pub struct OAuthFlow {
    provider: ProviderConfig,
    states: StateManager,
    credentials: CredentialStore,
    http: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(provider: ProviderConfig, store: Arc<dyn KvStore>, http: reqwest::Client) -> Self {
        Self {
            states: StateManager::new(provider.name.clone(), store.clone()),
            credentials: CredentialStore::new(provider.name.clone(), store),
            provider,
            http,
        }
    }

    pub fn authorization_url(&self, encoded_state: &str) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.provider.authorize_url).map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "invalid authorize URL for {}: {}",
                self.provider.name,
                e
            ))
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.provider.client_id)
            .append_pair("scope", &self.provider.scopes.join(" "))
            .append_pair("redirect_uri", &self.provider.redirect_uri)
            .append_pair("state", encoded_state);
        Ok(url)
    }

    /// Start a flow for the pair and return the consent URL.
    pub async fn authorize(&self, user_id: &str, org_id: &str) -> Result<String, AppError> {
        let encoded_state = self.states.issue(user_id, org_id).await?;
        let url = self.authorization_url(&encoded_state)?;
        tracing::info!(
            provider = %self.provider.name,
            user_id = %user_id,
            org_id = %org_id,
            "authorization flow started"
        );
        Ok(url.into())
    }

    /// Handle the provider redirect.
    ///
    /// The state is checked before anything else touches the network. The
    /// code exchange and the state deletion then run together; a failed
    /// deletion is only logged since the entry expires on its own.
    pub async fn oauth2callback(&self, params: CallbackParams) -> Result<Html<&'static str>, AppError> {
        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            let detail = match params.error_description.filter(|d| !d.is_empty()) {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            };
            tracing::warn!(provider = %self.provider.name, error = %detail, "provider denied authorization");
            return Err(AppError::ProviderDenied(detail));
        }

        let encoded_state = params.state.ok_or(AppError::StateMismatch)?;
        let state = AuthorizationState::decode(&encoded_state)?;
        self.states.check(&state).await?;

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or(AppError::MissingParameter("code"))?;

        let (exchange, cleanup) = tokio::join!(
            self.exchange_code(&code),
            self.states.consume(&state.user_id, &state.org_id)
        );
        if let Err(e) = cleanup {
            tracing::warn!(
                provider = %self.provider.name,
                user_id = %state.user_id,
                org_id = %state.org_id,
                "failed to delete consumed OAuth state: {}",
                e
            );
        }
        let credential = exchange?;

        self.credentials
            .save(&state.user_id, &state.org_id, &credential)
            .await?;
        tracing::info!(
            provider = %self.provider.name,
            user_id = %state.user_id,
            org_id = %state.org_id,
            "stored provider credentials"
        );

        Ok(Html(CALLBACK_PAGE))
    }

    /// One-shot read of the credential stored by the last completed flow.
    pub async fn get_credentials(&self, user_id: &str, org_id: &str) -> Result<Credential, AppError> {
        self.credentials.take(user_id, org_id).await
    }

    async fn exchange_code(&self, code: &str) -> Result<Credential, AppError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.provider.redirect_uri.as_str()),
            ("client_id", self.provider.client_id.as_str()),
            ("client_secret", self.provider.client_secret.as_str()),
        ];

        let resp = self
            .http
            .post(&self.provider.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(provider = %self.provider.name, "token request failed: {}", e);
                AppError::Upstream(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(
                provider = %self.provider.name,
                status = %status,
                body = %body,
                "token endpoint rejected the code"
            );
            return Err(AppError::TokenExchangeFailed);
        }

        let payload: Value = resp.json().await.map_err(|e| {
            tracing::warn!(provider = %self.provider.name, "token response is not JSON: {}", e);
            AppError::TokenExchangeFailed
        })?;

        Credential::from_value(payload).ok_or_else(|| {
            tracing::warn!(provider = %self.provider.name, "token response is empty");
            AppError::TokenExchangeFailed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use redis::{ErrorKind, RedisError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// MemoryStore whose reads or deletes can be switched to fail like a
    /// dropped Redis connection.
    #[derive(Default)]
    struct UnreliableStore {
        inner: MemoryStore,
        fail_get: AtomicBool,
        fail_delete: AtomicBool,
    }

    fn connection_down() -> StoreError {
        StoreError::Redis(RedisError::from((ErrorKind::IoError, "down")))
    }

    #[async_trait]
    impl KvStore for UnreliableStore {
        async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
            self.inner.set(key, value, ttl_secs).await
        }

        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(connection_down());
            }
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> StoreResult<()> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(connection_down());
            }
            self.inner.delete(key).await
        }
    }

    fn unreliable_flow(server_uri: &str) -> (OAuthFlow, Arc<UnreliableStore>) {
        let store = Arc::new(UnreliableStore::default());
        let flow = OAuthFlow::new(provider(server_uri), store.clone(), reqwest::Client::new());
        (flow, store)
    }

    fn provider(server_uri: &str) -> ProviderConfig {
        ProviderConfig {
            name: "hubspot".to_string(),
            client_id: "client-123".to_string(),
            client_secret: "secret-456".to_string(),
            authorize_url: "https://app.example.com/oauth/authorize".to_string(),
            token_url: format!("{}/oauth/v1/token", server_uri),
            redirect_uri: "http://localhost:8000/integrations/hubspot/oauth2callback".to_string(),
            scopes: vec!["oauth".to_string(), "crm.objects.contacts.read".to_string()],
        }
    }

    fn flow(server_uri: &str) -> (OAuthFlow, MemoryStore) {
        let store = MemoryStore::new();
        let flow = OAuthFlow::new(
            provider(server_uri),
            Arc::new(store.clone()),
            reqwest::Client::new(),
        );
        (flow, store)
    }

    fn state_from_url(url: &str) -> String {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("state parameter present")
    }

    fn callback(code: &str, state: String) -> CallbackParams {
        CallbackParams {
            code: Some(code.to_string()),
            state: Some(state),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_authorize_builds_consent_url() {
        let (flow, store) = flow("http://unused");
        let url = flow.authorize("user1", "org1").await.unwrap();
        let parsed = Url::parse(&url).unwrap();

        assert_eq!(parsed.host_str(), Some("app.example.com"));
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["scope"], "oauth crm.objects.contacts.read");
        assert_eq!(
            pairs["redirect_uri"],
            "http://localhost:8000/integrations/hubspot/oauth2callback"
        );

        let state = AuthorizationState::decode(&pairs["state"]).unwrap();
        assert_eq!(state.user_id, "user1");
        assert_eq!(state.org_id, "org1");
        assert!(store.get("hubspot_state:org1:user1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_callback_stores_credentials_and_consumes_state() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v1/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code"))
            .and(body_string_contains("client_secret=secret-456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-abc",
                "refresh_token": "ref-def",
                "expires_in": 1800
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (flow, store) = flow(&mock_server.uri());
        let url = flow.authorize("user1", "org1").await.unwrap();

        let page = flow
            .oauth2callback(callback("auth-code", state_from_url(&url)))
            .await
            .unwrap();
        assert!(page.0.contains("window.opener.postMessage"));
        assert!(page.0.contains("window.close()"));

        assert!(store.get("hubspot_state:org1:user1").await.unwrap().is_none());
        let cred = flow.get_credentials("user1", "org1").await.unwrap();
        assert_eq!(cred.access_token(), Some("tok-abc"));
    }

    #[tokio::test]
    async fn test_callback_replay_is_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v1/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "t"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let (flow, _) = flow(&mock_server.uri());
        let state = state_from_url(&flow.authorize("user1", "org1").await.unwrap());

        let page = flow.oauth2callback(callback("c", state.clone())).await.unwrap();
        assert_eq!(page.0, CALLBACK_PAGE);
        let replay = flow.oauth2callback(callback("c", state)).await;
        assert!(matches!(replay, Err(AppError::StateMismatch)));
    }

    #[tokio::test]
    async fn test_callback_error_never_exchanges() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let (flow, _) = flow(&mock_server.uri());
        let state = state_from_url(&flow.authorize("user1", "org1").await.unwrap());

        let result = flow
            .oauth2callback(CallbackParams {
                code: Some("c".into()),
                state: Some(state),
                error: Some("access_denied".into()),
                error_description: Some("User denied access".into()),
            })
            .await;
        match result {
            Err(AppError::ProviderDenied(msg)) => {
                assert_eq!(msg, "access_denied: User denied access")
            }
            other => panic!("expected ProviderDenied, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_callback_with_forged_state_never_exchanges() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let (flow, _) = flow(&mock_server.uri());
        flow.authorize("user1", "org1").await.unwrap();

        let forged = AuthorizationState::new("user1", "org1").encode().unwrap();
        let result = flow.oauth2callback(callback("valid-code", forged)).await;
        assert!(matches!(result, Err(AppError::StateMismatch)));

        let missing = flow
            .oauth2callback(CallbackParams {
                code: Some("valid-code".into()),
                ..Default::default()
            })
            .await;
        assert!(matches!(missing, Err(AppError::StateMismatch)));
    }

    #[tokio::test]
    async fn test_token_endpoint_failure_still_consumes_state() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"status":"BAD_AUTH_CODE"}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (flow, store) = flow(&mock_server.uri());
        let state = state_from_url(&flow.authorize("user1", "org1").await.unwrap());

        let result = flow.oauth2callback(callback("bad-code", state)).await;
        assert!(matches!(result, Err(AppError::TokenExchangeFailed)));
        assert!(store.get("hubspot_state:org1:user1").await.unwrap().is_none());
        assert!(store.get("hubspot_credentials:org1:user1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_code_is_rejected_after_state_check() {
        let (flow, _) = flow("http://unused");
        let state = state_from_url(&flow.authorize("user1", "org1").await.unwrap());

        let result = flow
            .oauth2callback(CallbackParams {
                state: Some(state),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(AppError::MissingParameter("code"))));
    }

    #[tokio::test]
    async fn test_failed_state_cleanup_still_completes_flow() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/v1/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "tok"})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let (flow, store) = unreliable_flow(&mock_server.uri());
        let state = state_from_url(&flow.authorize("user1", "org1").await.unwrap());
        store.fail_delete.store(true, Ordering::SeqCst);

        let page = flow.oauth2callback(callback("c", state)).await.unwrap();
        assert_eq!(page.0, CALLBACK_PAGE);

        let stored = store
            .inner
            .get("hubspot_credentials:org1:user1")
            .await
            .unwrap()
            .expect("credential stored");
        let cred: Credential = serde_json::from_str(&stored).unwrap();
        assert_eq!(cred.access_token(), Some("tok"));
    }

    #[tokio::test]
    async fn test_store_read_failure_is_internal_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let (flow, store) = unreliable_flow(&mock_server.uri());
        let state = state_from_url(&flow.authorize("user1", "org1").await.unwrap());
        store.fail_get.store(true, Ordering::SeqCst);

        let err = flow
            .oauth2callback(callback("c", state))
            .await
            .expect_err("store is down");
        assert!(matches!(err, AppError::Store(StoreError::Redis(_))));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
