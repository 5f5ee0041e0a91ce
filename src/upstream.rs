//! HTTP client shared by the token exchange and the provider API calls.
//! No retry layer: failed provider calls surface to the caller as-is.
use anyhow::Context;

pub fn build_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .pool_max_idle_per_host(8)
        .user_agent(concat!("crm-integrations/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}
