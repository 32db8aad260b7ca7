//! Start a link: ask the backend for a provider URL, remember the state,
//! send the browser away.

use std::sync::Arc;

use tracing::{info, warn};

use super::backend::{ClientSession, LinkBackend};
use super::state::StateTokenManager;
use crate::error::LinkError;
use crate::platforms::Platform;

/// Full-page navigation. Leaving for a provider URL ends the page load.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

pub struct RedirectInitiator {
    backend: Arc<dyn LinkBackend>,
    states: StateTokenManager,
    navigator: Arc<dyn Navigator>,
}

impl RedirectInitiator {
    pub fn new(
        backend: Arc<dyn LinkBackend>,
        states: StateTokenManager,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            backend,
            states,
            navigator,
        }
    }

    /// On error nothing is stored and the browser stays where it is.
    pub async fn initiate(
        &self,
        session: Option<&ClientSession>,
        platform: &str,
    ) -> Result<(), LinkError> {
        let session = session.ok_or(LinkError::Unauthorized)?;
        let platform: Platform = platform
            .parse()
            .map_err(|e| LinkError::BadRequest(format!("{e}")))?;

        let grant = self
            .backend
            .request_authorization(session, platform)
            .await
            .inspect_err(|e| warn!(%platform, "Could not start linking: {e}"))?;

        if grant.platform != platform {
            return Err(LinkError::Internal(format!(
                "backend answered for {} instead of {platform}",
                grant.platform
            )));
        }

        self.states.issue(platform, &grant.state);
        info!(%platform, "Redirecting to provider");
        self.navigator.navigate(&grant.auth_url);
        Ok(())
    }
}
