pub const DEFAULT_PORT: u16 = 8000;

/// OAuth client settings for one provider. Constructed once at startup and
/// handed to the flow controller.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Short provider name, used as the store key prefix (`hubspot_state:...`).
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    /// Origin of the frontend allowed through CORS.
    pub dashboard_origin: String,
    pub hubspot: ProviderConfig,
    /// Base URL of the HubSpot REST API (overridable for tests and sandboxes).
    pub hubspot_api_base_url: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let client_id = std::env::var("CLIENT_ID").unwrap_or_default();
    let client_secret = std::env::var("CLIENT_SECRET").unwrap_or_default();

    if client_id.is_empty() || client_secret.is_empty() {
        let env_mode = std::env::var("APP_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!("CLIENT_ID and CLIENT_SECRET must be set when running in production.");
        }
        tracing::warn!("CLIENT_ID or CLIENT_SECRET is not set; the provider will reject token exchanges");
    }

    let port = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let api_base_url = std::env::var("HUBSPOT_API_BASE_URL")
        .unwrap_or_else(|_| crate::integrations::hubspot::API_BASE_URL.into());

    let mut hubspot =
        crate::integrations::hubspot::provider_config(client_id, client_secret, &api_base_url);
    if let Ok(uri) = std::env::var("HUBSPOT_REDIRECT_URI") {
        hubspot.redirect_uri = uri;
    } else {
        hubspot.redirect_uri = format!(
            "http://localhost:{}/integrations/hubspot/oauth2callback",
            port
        );
    }
    if let Ok(url) = std::env::var("HUBSPOT_AUTHORIZE_URL") {
        hubspot.authorize_url = url;
    }

    Ok(Config {
        port,
        redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
        dashboard_origin: std::env::var("DASHBOARD_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".into()),
        hubspot,
        hubspot_api_base_url: api_base_url,
    })
}
