//! Shared fixtures for unit tests.

use std::sync::Arc;

use base64::Engine as _;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::auth::verify::SessionClaims;
use crate::auth::UserSession;
use crate::config::Config;
use crate::platforms::{
    AppCredentials, FacebookPlatform, InstagramPlatform, LinkedinPlatform, Platform,
    PlatformEndpoints, PlatformRegistry, TwitterPlatform,
};
use crate::store::MemoryAccountStore;
use crate::AppState;

pub const SESSION_SECRET: &str = "test-session-secret";

pub fn config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        app_url: "http://localhost:5173".into(),
        database_url: None,
        master_key: base64::engine::general_purpose::STANDARD.encode([0x42u8; 32]),
        hmac_secret: base64::engine::general_purpose::STANDARD.encode([0x43u8; 32]),
        session_jwt_secret: SESSION_SECRET.into(),
        state_ttl_secs: 600,
        refresh_interval_secs: 300,
        twitter: None,
        facebook: None,
        instagram: None,
        linkedin: None,
    }
}

pub fn credentials(platform: Platform) -> AppCredentials {
    AppCredentials {
        client_id: format!("{platform}-client"),
        client_secret: format!("{platform}-secret"),
        redirect_uri: "http://localhost:5173/auth/callback".into(),
    }
}

pub fn endpoints(base: &str, platform: Platform) -> PlatformEndpoints {
    PlatformEndpoints {
        authorize: format!("{base}/{platform}/authorize"),
        token: format!("{base}/{platform}/token"),
        profile: format!("{base}/{platform}/profile"),
    }
}

/// Every platform onboarded, all pointed at `base`.
pub fn registry(base: &str) -> PlatformRegistry {
    let mut registry = PlatformRegistry::new();
    registry.register(Box::new(
        TwitterPlatform::new(credentials(Platform::Twitter))
            .with_endpoints(endpoints(base, Platform::Twitter)),
    ));
    registry.register(Box::new(
        FacebookPlatform::new(credentials(Platform::Facebook))
            .with_endpoints(endpoints(base, Platform::Facebook)),
    ));
    registry.register(Box::new(
        InstagramPlatform::new(credentials(Platform::Instagram))
            .with_endpoints(endpoints(base, Platform::Instagram)),
    ));
    registry.register(Box::new(
        LinkedinPlatform::new(credentials(Platform::Linkedin))
            .with_endpoints(endpoints(base, Platform::Linkedin)),
    ));
    registry
}

pub fn app_state(base: &str, store: MemoryAccountStore) -> AppState {
    AppState::new(config(), Arc::new(store), registry(base)).unwrap()
}

pub fn session(user_id: &str) -> UserSession {
    UserSession {
        user_id: user_id.into(),
        role: Some("authenticated".into()),
    }
}

pub fn session_token(user_id: &str) -> String {
    let claims = SessionClaims {
        sub: user_id.into(),
        exp: chrono::Utc::now().timestamp() + 3600,
        role: Some("authenticated".into()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SESSION_SECRET.as_bytes()),
    )
    .unwrap()
}
