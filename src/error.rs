use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Unified error type for the account-linking service and client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LinkError {
    // ── Request Errors ──────────────────────────────────────────────────
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Insufficient permissions: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    // ── Linking Flow Errors ─────────────────────────────────────────────
    #[error("Invalid state token")]
    InvalidState,

    #[error("Authorization attempt expired, please start again")]
    Expired,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Profile fetch failed: {0}")]
    ProfileFetch(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// An error reported by the backend, decoded on the client side.
    /// The message is the backend's text, shown verbatim.
    #[error("{message}")]
    Remote { kind: ErrorKind, message: String },
}

/// Wire-level error classification, sent as `code` in error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InvalidState,
    Expired,
    ConfigurationError,
    TokenExchangeError,
    ProfileFetchError,
    RefreshFailed,
    StorageError,
    CryptoError,
    NetworkError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Expired => "expired",
            ErrorKind::ConfigurationError => "configuration_error",
            ErrorKind::TokenExchangeError => "token_exchange_error",
            ErrorKind::ProfileFetchError => "profile_fetch_error",
            ErrorKind::RefreshFailed => "refresh_failed",
            ErrorKind::StorageError => "storage_error",
            ErrorKind::CryptoError => "crypto_error",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::InternalError => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidState => StatusCode::BAD_REQUEST,
            ErrorKind::Expired => StatusCode::BAD_REQUEST,
            ErrorKind::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::TokenExchangeError => StatusCode::BAD_GATEWAY,
            ErrorKind::ProfileFetchError => StatusCode::BAD_GATEWAY,
            ErrorKind::RefreshFailed => StatusCode::BAD_GATEWAY,
            ErrorKind::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::CryptoError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::NetworkError => StatusCode::BAD_GATEWAY,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl LinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::BadRequest(_) => ErrorKind::BadRequest,
            LinkError::Unauthorized => ErrorKind::Unauthorized,
            LinkError::Forbidden(_) => ErrorKind::Forbidden,
            LinkError::NotFound(_) => ErrorKind::NotFound,
            LinkError::InvalidState => ErrorKind::InvalidState,
            LinkError::Expired => ErrorKind::Expired,
            LinkError::Configuration(_) => ErrorKind::ConfigurationError,
            LinkError::TokenExchange(_) => ErrorKind::TokenExchangeError,
            LinkError::ProfileFetch(_) => ErrorKind::ProfileFetchError,
            LinkError::RefreshFailed(_) => ErrorKind::RefreshFailed,
            LinkError::Storage(_) => ErrorKind::StorageError,
            LinkError::Crypto(_) => ErrorKind::CryptoError,
            LinkError::Network(_) => ErrorKind::NetworkError,
            LinkError::Internal(_) => ErrorKind::InternalError,
            LinkError::Remote { kind, .. } => *kind,
        }
    }
}

impl From<sqlx::Error> for LinkError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        LinkError::Storage(e.to_string())
    }
}

impl From<JsonRejection> for LinkError {
    fn from(rejection: JsonRejection) -> Self {
        LinkError::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for LinkError {
    fn from(e: anyhow::Error) -> Self {
        LinkError::Internal(e.to_string())
    }
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status();

        if status.is_server_error() {
            tracing::error!(code = kind.as_str(), "{self}");
        } else {
            tracing::debug!(code = kind.as_str(), "{self}");
        }

        let body = json!({
            "error": self.to_string(),
            "code": kind.as_str(),
        });

        (status, axum::Json(body)).into_response()
    }
}
