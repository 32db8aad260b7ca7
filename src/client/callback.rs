//! The provider redirect lands here with `code` and `state`.
//!
//! The handler matches the state to a pending attempt, consumes it and asks
//! the backend to finish the link. An unmatched state fails the callback;
//! the exchange never runs with a state this client did not issue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::backend::{ClientSession, LinkBackend};
use super::initiator::Navigator;
use super::state::{StateMatch, StateTokenManager};
use crate::error::LinkError;
use crate::linking::ExchangeRequest;
use crate::platforms::{NormalizedProfile, Platform};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl CallbackParams {
    /// Parse a redirect query string, with or without the leading `?`.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    fn complete(&self) -> Option<(&str, &str)> {
        let code = self.code.as_deref().filter(|c| !c.is_empty())?;
        let state = self.state.as_deref().filter(|s| !s.is_empty())?;
        Some((code, state))
    }
}

/// What the callback page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackStatus {
    Idle,
    Pending,
    Success(NormalizedProfile),
    Failure(String),
}

#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// `code` or `state` absent: someone opened the page directly.
    NotACallback,
    /// This page load already handled a callback.
    Ignored,
    Linked(NormalizedProfile),
    Failed(LinkError),
}

#[derive(Debug, Clone)]
pub struct CallbackOptions {
    pub profile_path: String,
    pub accounts_path: String,
    /// Pause on the confirmation before leaving for the profile view.
    pub redirect_delay: Duration,
}

impl Default for CallbackOptions {
    fn default() -> Self {
        Self {
            profile_path: "/profile".into(),
            accounts_path: "/accounts".into(),
            redirect_delay: Duration::from_secs(2),
        }
    }
}

/// One per page load.
pub struct CallbackHandler {
    backend: Arc<dyn LinkBackend>,
    states: StateTokenManager,
    navigator: Arc<dyn Navigator>,
    options: CallbackOptions,
    status: watch::Sender<CallbackStatus>,
    started: AtomicBool,
}

impl CallbackHandler {
    pub fn new(
        backend: Arc<dyn LinkBackend>,
        states: StateTokenManager,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            backend,
            states,
            navigator,
            options: CallbackOptions::default(),
            status: watch::channel(CallbackStatus::Idle).0,
            started: AtomicBool::new(false),
        }
    }

    pub fn with_options(mut self, options: CallbackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<CallbackStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> CallbackStatus {
        self.status.borrow().clone()
    }

    pub async fn handle(
        &self,
        session: Option<&ClientSession>,
        params: &CallbackParams,
    ) -> CallbackOutcome {
        let Some((code, state)) = params.complete() else {
            debug!("Callback page opened without code and state");
            return CallbackOutcome::NotACallback;
        };

        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Callback already handled for this page load");
            return CallbackOutcome::Ignored;
        }
        self.status.send_replace(CallbackStatus::Pending);

        match self.complete_link(session, code, state).await {
            Ok(profile) => {
                info!(username = %profile.username, "Account linked");
                self.status.send_replace(CallbackStatus::Success(profile.clone()));
                tokio::time::sleep(self.options.redirect_delay).await;
                self.navigator.navigate(&self.options.profile_path);
                CallbackOutcome::Linked(profile)
            }
            Err(e) => {
                warn!("Linking failed: {e}");
                self.status.send_replace(CallbackStatus::Failure(e.to_string()));
                CallbackOutcome::Failed(e)
            }
        }
    }

    /// The manual way out of a failed callback.
    pub fn return_to_accounts(&self) {
        self.navigator.navigate(&self.options.accounts_path);
    }

    async fn complete_link(
        &self,
        session: Option<&ClientSession>,
        code: &str,
        state: &str,
    ) -> Result<NormalizedProfile, LinkError> {
        let session = session.ok_or(LinkError::Unauthorized)?;
        let platform = self.detect_platform(state)?;

        if !self.states.consume(platform, state) {
            return Err(LinkError::InvalidState);
        }

        let req = ExchangeRequest {
            code: code.to_string(),
            state: state.to_string(),
            platform: platform.to_string(),
            user_id: session.user_id.clone(),
        };
        self.backend.exchange(session, &req).await
    }

    fn detect_platform(&self, state: &str) -> Result<Platform, LinkError> {
        let mut expired = false;
        for platform in Platform::ALL {
            match self.states.inspect(platform, state) {
                StateMatch::Matched => return Ok(platform),
                StateMatch::Expired => expired = true,
                StateMatch::Mismatched | StateMatch::Missing => {}
            }
        }
        Err(if expired {
            LinkError::Expired
        } else {
            LinkError::InvalidState
        })
    }
}
