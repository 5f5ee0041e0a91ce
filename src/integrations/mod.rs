//! Provider-specific integrations built on the generic OAuth flow.

pub mod hubspot;

pub use hubspot::HubspotIntegration;
