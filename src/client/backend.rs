//! Client-side calls into the linking backend.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ErrorKind, LinkError};
use crate::linking::{AuthorizationGrant, ExchangeRequest, ExchangeResponse};
use crate::platforms::{NormalizedProfile, Platform};

/// The signed-in dashboard user, as the client knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSession {
    pub user_id: String,
    /// Bearer token issued by the auth service.
    pub access_token: String,
}

#[async_trait]
pub trait LinkBackend: Send + Sync {
    async fn request_authorization(
        &self,
        session: &ClientSession,
        platform: Platform,
    ) -> Result<AuthorizationGrant, LinkError>;

    async fn exchange(
        &self,
        session: &ClientSession,
        req: &ExchangeRequest,
    ) -> Result<NormalizedProfile, LinkError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<ErrorKind>,
}

/// [`LinkBackend`] over the service's HTTP API.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        session: &ClientSession,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, LinkError> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&session.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LinkError::Network(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(decode_error(status, resp.text().await.unwrap_or_default()));
        }

        resp.json::<T>()
            .await
            .map_err(|e| LinkError::Network(format!("unreadable backend response: {e}")))
    }
}

/// Turn a `{error, code}` body into a [`LinkError::Remote`] carrying the
/// backend's message as-is.
fn decode_error(status: StatusCode, body: String) -> LinkError {
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => LinkError::Remote {
            kind: parsed.code.unwrap_or_else(|| kind_for_status(status)),
            message: parsed.error,
        },
        Err(_) => LinkError::Remote {
            kind: kind_for_status(status),
            message: if body.is_empty() {
                format!("backend returned {status}")
            } else {
                body
            },
        },
    }
}

fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::BAD_REQUEST => ErrorKind::BadRequest,
        StatusCode::UNAUTHORIZED => ErrorKind::Unauthorized,
        StatusCode::FORBIDDEN => ErrorKind::Forbidden,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        s if s.is_server_error() => ErrorKind::InternalError,
        _ => ErrorKind::NetworkError,
    }
}

#[async_trait]
impl LinkBackend for HttpBackend {
    async fn request_authorization(
        &self,
        session: &ClientSession,
        platform: Platform,
    ) -> Result<AuthorizationGrant, LinkError> {
        self.post(
            session,
            "/v1/oauth/authorize",
            json!({ "platform": platform, "user_id": session.user_id }),
        )
        .await
    }

    async fn exchange(
        &self,
        session: &ClientSession,
        req: &ExchangeRequest,
    ) -> Result<NormalizedProfile, LinkError> {
        let body = serde_json::to_value(req).map_err(|e| LinkError::Internal(e.to_string()))?;
        let resp: ExchangeResponse = self.post(session, "/v1/oauth/exchange", body).await?;
        if !resp.success {
            return Err(LinkError::Internal("backend reported an unsuccessful link".into()));
        }
        Ok(resp.user)
    }
}
