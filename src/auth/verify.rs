//! Session verification for end-user requests.
//!
//! The dashboard signs users in through a managed auth service that issues
//! HS256 JWTs; `sub` carries the user id.

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// An interactively authenticated end user.
///
/// This is the ordinary capability: it can read and disconnect its own
/// accounts but cannot create or reconnect account rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: String,
    pub role: Option<String>,
}

impl UserSession {
    /// Reject requests that act on behalf of someone other than the session owner.
    pub fn ensure_owner(&self, user_id: &str) -> Result<(), LinkError> {
        if self.user_id != user_id {
            return Err(LinkError::Forbidden(
                "user_id does not match the authenticated session".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub role: Option<String>,
}

/// Verifies session JWTs against the auth service's shared secret.
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<UserSession, LinkError> {
        let data = decode::<SessionClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    tracing::debug!("Rejected expired session token");
                }
                _ => tracing::debug!("Rejected session token: {e}"),
            }
            LinkError::Unauthorized
        })?;

        if data.claims.sub.is_empty() {
            return Err(LinkError::Unauthorized);
        }

        Ok(UserSession {
            user_id: data.claims.sub,
            role: data.claims.role,
        })
    }

    /// Extract and verify the bearer token of a request.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<UserSession, LinkError> {
        let token = bearer_token(headers).ok_or(LinkError::Unauthorized)?;
        self.verify_token(token)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
