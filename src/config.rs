use anyhow::{Context, Result};

use crate::platforms::{AppCredentials, Platform};

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    /// Dashboard frontend URL; provider redirects land on `{app_url}/auth/callback`.
    pub app_url: String,

    // ── Database ────────────────────────────────────────────────────────
    /// PostgreSQL connection string. Without it accounts live in memory.
    pub database_url: Option<String>,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// 32-byte base64-encoded master key for AES-256-GCM token encryption.
    pub master_key: String,
    /// 32-byte base64-encoded HMAC key for state signing.
    pub hmac_secret: String,

    // ── Sessions ────────────────────────────────────────────────────────
    /// HS256 secret of the managed auth service; `sub` is the user id.
    pub session_jwt_secret: String,

    // ── Linking ─────────────────────────────────────────────────────────
    /// How long an issued state stays valid.
    pub state_ttl_secs: i64,
    pub refresh_interval_secs: u64,

    // ── Platform App Credentials ────────────────────────────────────────
    pub twitter: Option<AppCredentials>,
    pub facebook: Option<AppCredentials>,
    pub instagram: Option<AppCredentials>,
    pub linkedin: Option<AppCredentials>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let app_url =
            std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:5173".into());

        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8430".into())
                .parse()
                .context("Invalid PORT")?,

            database_url: std::env::var("DATABASE_URL").ok(),

            master_key: std::env::var("MASTER_KEY")
                .context("MASTER_KEY is required (32 bytes, base64)")?,
            hmac_secret: std::env::var("HMAC_SECRET")
                .context("HMAC_SECRET is required (32 bytes, base64)")?,

            session_jwt_secret: std::env::var("SESSION_JWT_SECRET")
                .context("SESSION_JWT_SECRET is required to verify user sessions")?,

            state_ttl_secs: std::env::var("STATE_TTL_SECS")
                .unwrap_or_else(|_| "600".into())
                .parse()
                .context("Invalid STATE_TTL_SECS")?,
            refresh_interval_secs: std::env::var("REFRESH_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".into())
                .parse()
                .context("Invalid REFRESH_INTERVAL_SECS")?,

            twitter: platform_credentials(Platform::Twitter, &app_url),
            facebook: platform_credentials(Platform::Facebook, &app_url),
            instagram: platform_credentials(Platform::Instagram, &app_url),
            linkedin: platform_credentials(Platform::Linkedin, &app_url),

            app_url,
        })
    }

    /// Where the provider sends the browser back to, unless overridden per platform.
    pub fn default_redirect_uri(app_url: &str) -> String {
        format!("{}/auth/callback", app_url.trim_end_matches('/'))
    }

    pub fn state_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.state_ttl_secs)
    }
}

/// Reads `<PLATFORM>_CLIENT_ID`, `<PLATFORM>_CLIENT_SECRET` and the optional
/// `<PLATFORM>_REDIRECT_URI`. A platform without both id and secret is not onboarded.
fn platform_credentials(platform: Platform, app_url: &str) -> Option<AppCredentials> {
    let prefix = platform.as_str().to_uppercase();
    let client_id = std::env::var(format!("{prefix}_CLIENT_ID")).ok()?;
    let client_secret = std::env::var(format!("{prefix}_CLIENT_SECRET")).ok()?;
    if client_id.is_empty() || client_secret.is_empty() {
        return None;
    }

    let redirect_uri = std::env::var(format!("{prefix}_REDIRECT_URI"))
        .unwrap_or_else(|_| Config::default_redirect_uri(app_url));

    Some(AppCredentials {
        client_id,
        client_secret,
        redirect_uri,
    })
}
