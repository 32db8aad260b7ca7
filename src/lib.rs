pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod linking;
pub mod platforms;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::LinkError;

use std::sync::Arc;

use auth::{ServiceIdentity, SessionVerifier};
use crypto::CryptoEngine;
use linking::ProviderClient;
use platforms::PlatformRegistry;
use store::AccountStore;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn AccountStore>,
    pub crypto: CryptoEngine,
    pub registry: PlatformRegistry,
    pub sessions: SessionVerifier,
    pub provider: ProviderClient,
    service: ServiceIdentity,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn AccountStore>,
        registry: PlatformRegistry,
    ) -> Result<Self, LinkError> {
        let crypto = CryptoEngine::new(&config.master_key, &config.hmac_secret)?;
        let sessions = SessionVerifier::new(&config.session_jwt_secret);

        Ok(Self {
            config,
            store,
            crypto,
            registry,
            sessions,
            provider: ProviderClient::new(),
            service: ServiceIdentity::backend(),
        })
    }

    /// The elevated identity for account writes. Only reachable from
    /// backend code paths, never from request input.
    pub(crate) fn service(&self) -> &ServiceIdentity {
        &self.service
    }
}

pub type SharedState = Arc<AppState>;
