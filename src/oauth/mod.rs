//! OAuth2 authorization-code flow with CSRF-protected state and transient,
//! single-use credential storage.

pub mod credentials;
pub mod flow;
pub mod state;

pub use credentials::{Credential, CredentialStore, CREDENTIALS_TTL_SECS};
pub use flow::{CallbackParams, OAuthFlow, CALLBACK_PAGE};
pub use state::{AuthorizationState, StateManager, STATE_TTL_SECS};
