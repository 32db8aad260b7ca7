use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LinkError;

/// Social platforms wired to a real token exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Facebook,
    Instagram,
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported platform: {0}")]
pub struct UnsupportedPlatform(pub String);

impl FromStr for Platform {
    type Err = UnsupportedPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "twitter" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "linkedin" => Ok(Platform::Linkedin),
            other => Err(UnsupportedPlatform(other.to_string())),
        }
    }
}

/// App credentials registered with a provider. Never leaves the backend.
#[derive(Clone)]
pub struct AppCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Provider endpoints. Defaults point at production; tests swap in a mock server.
#[derive(Debug, Clone)]
pub struct PlatformEndpoints {
    pub authorize: String,
    pub token: String,
    pub profile: String,
}

/// Tokens returned from a provider after code exchange or refresh.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Absolute expiry for a token issued at `now`. An `expires_in` too large
    /// to represent is treated as no expiry.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.expires_in?).ok()?;
        let expires_at = chrono::Duration::try_seconds(secs)
            .and_then(|ttl| now.checked_add_signed(ttl));
        if expires_at.is_none() {
            tracing::warn!(expires_in = secs, "Ignoring out-of-range token lifetime");
        }
        expires_at
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// A form-encoded POST against a provider token endpoint.
#[derive(Clone)]
pub struct TokenRequest {
    pub url: String,
    pub form: Vec<(&'static str, String)>,
    /// Send client credentials as HTTP Basic auth as well as in the body.
    pub basic_auth: Option<(String, String)>,
}

impl TokenRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Provider profile mapped into one common shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

/// Everything platform-specific about linking an account.
///
/// Implementations are pure: they build requests and interpret responses,
/// while `linking::exchange` performs the HTTP calls. That keeps provider
/// quirks testable without a network.
pub trait SocialPlatform: Send + Sync {
    fn platform(&self) -> Platform;

    /// Human-readable display name (e.g. "X (Twitter)").
    fn display_name(&self) -> &str;

    fn credentials(&self) -> &AppCredentials;

    fn default_scopes(&self) -> Vec<String>;

    /// Build the provider URL the browser is sent to.
    fn authorize_url(&self, state: &str, pkce_challenge: Option<&str>) -> String;

    fn token_endpoint(&self) -> &str;

    /// Authorization-code grant for this platform. The default posts the
    /// standard form with the client secret in the body.
    fn build_exchange_request(&self, code: &str, _pkce_verifier: Option<&str>) -> TokenRequest {
        TokenRequest {
            url: self.token_endpoint().to_string(),
            form: authorization_code_form(self.credentials(), code),
            basic_auth: None,
        }
    }

    /// Refresh-token grant, for platforms that issue refresh tokens.
    fn build_refresh_request(&self, _refresh_token: &str) -> Option<TokenRequest> {
        None
    }

    /// Profile URL including the platform's field selection.
    fn profile_endpoint(&self) -> String;

    fn normalize_profile(&self, body: &serde_json::Value) -> Result<NormalizedProfile, LinkError>;

    /// Whether the authorize/exchange pair carries a PKCE challenge/verifier.
    fn uses_pkce(&self) -> bool {
        false
    }
}

/// The standard `authorization_code` grant body.
pub fn authorization_code_form(
    credentials: &AppCredentials,
    code: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("client_id", credentials.client_id.clone()),
        ("client_secret", credentials.client_secret.clone()),
        ("redirect_uri", credentials.redirect_uri.clone()),
    ]
}

pub(crate) fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Read a JSON pointer as a string, accepting numeric ids as well.
pub(crate) fn json_string(body: &serde_json::Value, pointer: &str) -> Option<String> {
    match body.pointer(pointer)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_u64(body: &serde_json::Value, pointer: &str) -> Option<u64> {
    body.pointer(pointer).and_then(|v| v.as_u64())
}

pub(crate) fn missing_field(platform: Platform, field: &str) -> LinkError {
    LinkError::ProfileFetch(format!("{platform} profile response is missing `{field}`"))
}
