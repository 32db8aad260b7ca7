//! Fakes shared by the client tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::backend::{ClientSession, LinkBackend};
use super::initiator::Navigator;
use crate::error::LinkError;
use crate::linking::{AuthorizationGrant, ExchangeRequest};
use crate::platforms::{NormalizedProfile, Platform};

pub fn profile(platform: Platform) -> NormalizedProfile {
    NormalizedProfile {
        id: format!("{platform}-u1"),
        name: "Dev Account".into(),
        username: "devaccount".into(),
        followers_count: Some(42),
        profile_image_url: None,
    }
}

/// Issues `state-<platform>-<n>` and answers exchanges with [`profile`].
#[derive(Default)]
pub struct FakeBackend {
    authorize_error: Option<LinkError>,
    exchange_error: Option<LinkError>,
    gate: Option<Arc<Notify>>,
    issued: Mutex<HashMap<Platform, usize>>,
    authorize_calls: AtomicUsize,
    exchanges: Mutex<Vec<ExchangeRequest>>,
}

impl FakeBackend {
    pub fn failing_authorize(err: LinkError) -> Self {
        Self {
            authorize_error: Some(err),
            ..Self::default()
        }
    }

    pub fn failing_exchange(err: LinkError) -> Self {
        Self {
            exchange_error: Some(err),
            ..Self::default()
        }
    }

    /// Hold every exchange until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn exchanges(&self) -> Vec<ExchangeRequest> {
        self.exchanges.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkBackend for FakeBackend {
    async fn request_authorization(
        &self,
        _session: &ClientSession,
        platform: Platform,
    ) -> Result<AuthorizationGrant, LinkError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.authorize_error {
            return Err(err.clone());
        }
        let n = {
            let mut issued = self.issued.lock().unwrap();
            let n = issued.entry(platform).or_insert(0);
            *n += 1;
            *n
        };
        let state = format!("state-{platform}-{n}");
        Ok(AuthorizationGrant {
            auth_url: format!("https://provider.test/{platform}?state={state}"),
            state,
            platform,
        })
    }

    async fn exchange(
        &self,
        _session: &ClientSession,
        req: &ExchangeRequest,
    ) -> Result<NormalizedProfile, LinkError> {
        self.exchanges.lock().unwrap().push(req.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(err) = &self.exchange_error {
            return Err(err.clone());
        }
        let platform: Platform = req
            .platform
            .parse()
            .map_err(|e| LinkError::Configuration(format!("{e}")))?;
        Ok(profile(platform))
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        self.visited.lock().unwrap().push(url.to_string());
    }
}
