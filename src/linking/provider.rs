//! HTTP calls against provider token and profile endpoints.

use reqwest::header::ACCEPT;
use std::fmt;

use crate::platforms::{TokenRequest, TokenSet};

/// Why a provider call did not produce a usable response.
#[derive(Debug)]
pub enum ProviderFailure {
    Transport(String),
    /// Non-2xx response; `body` is the provider's raw error body.
    Status { status: u16, body: String },
    Decode(String),
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFailure::Transport(e) => write!(f, "request failed: {e}"),
            ProviderFailure::Status { status, body } => write!(f, "HTTP {status}: {body}"),
            ProviderFailure::Decode(e) => write!(f, "unreadable response: {e}"),
        }
    }
}

/// Shared HTTP client for provider calls.
#[derive(Clone, Default)]
pub struct ProviderClient {
    http: reqwest::Client,
}

impl ProviderClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// POST a form-encoded grant and decode the token response.
    pub async fn request_tokens(&self, req: &TokenRequest) -> Result<TokenSet, ProviderFailure> {
        let mut builder = self
            .http
            .post(&req.url)
            .header(ACCEPT, "application/json")
            .form(&req.form);
        if let Some((user, password)) = &req.basic_auth {
            builder = builder.basic_auth(user, Some(password));
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ProviderFailure::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<TokenSet>()
            .await
            .map_err(|e| ProviderFailure::Decode(e.without_url().to_string()))
    }

    /// GET a profile document with bearer auth.
    pub async fn fetch_profile(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<serde_json::Value, ProviderFailure> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ProviderFailure::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderFailure::Decode(e.without_url().to_string()))
    }
}
