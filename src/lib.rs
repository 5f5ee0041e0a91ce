//! HubSpot OAuth2 integration service — library crate.
//!
//! Re-exports the modules used by the server binary and the integration
//! tests in `tests/`.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod errors;
pub mod integrations;
pub mod jobs;
pub mod models;
pub mod oauth;
pub mod store;
pub mod upstream;

use integrations::HubspotIntegration;
use store::KvStore;

/// Shared application state passed to handlers.
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub hubspot: HubspotIntegration,
}

impl AppState {
    pub fn new(cfg: &config::Config, store: Arc<dyn KvStore>) -> anyhow::Result<Self> {
        let http = upstream::build_client()?;
        Ok(Self::with_client(cfg, store, http))
    }

    pub fn with_client(
        cfg: &config::Config,
        store: Arc<dyn KvStore>,
        http: reqwest::Client,
    ) -> Self {
        let hubspot = HubspotIntegration::new(
            cfg.hubspot.clone(),
            &cfg.hubspot_api_base_url,
            store.clone(),
            http,
        );
        Self { store, hubspot }
    }
}
