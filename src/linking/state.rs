//! Server-issued state tokens.
//!
//! A state is an HMAC-signed claim set binding a random nonce to the user,
//! the platform and the issue time. The browser keeps it as an opaque string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::CryptoEngine;
use crate::error::LinkError;
use crate::platforms::Platform;

#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    #[serde(rename = "u")]
    user_id: String,
    #[serde(rename = "p")]
    platform: Platform,
    #[serde(rename = "iat")]
    issued_at: i64,
    #[serde(rename = "n")]
    nonce: String,
}

pub fn issue_state(
    crypto: &CryptoEngine,
    user_id: &str,
    platform: Platform,
    now: DateTime<Utc>,
) -> Result<String, LinkError> {
    let claims = StateClaims {
        user_id: user_id.to_string(),
        platform,
        issued_at: now.timestamp(),
        nonce: crypto.random_token(),
    };
    let payload = serde_json::to_string(&claims)
        .map_err(|e| LinkError::Internal(format!("state encoding failed: {e}")))?;
    crypto.sign_state(&payload)
}

/// Check that `state` was minted here for this user and platform and is still fresh.
pub fn verify_state(
    crypto: &CryptoEngine,
    state: &str,
    user_id: &str,
    platform: Platform,
    ttl: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<(), LinkError> {
    let payload = crypto.verify_state(state)?;
    let claims: StateClaims =
        serde_json::from_str(&payload).map_err(|_| LinkError::InvalidState)?;

    if claims.user_id != user_id || claims.platform != platform {
        return Err(LinkError::InvalidState);
    }

    if now.timestamp() - claims.issued_at > ttl.num_seconds() {
        return Err(LinkError::Expired);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn crypto() -> CryptoEngine {
        let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        let hmac = base64::engine::general_purpose::STANDARD.encode([9u8; 32]);
        CryptoEngine::new(&key, &hmac).unwrap()
    }

    #[test]
    fn fresh_state_verifies_for_its_binding_only() {
        let crypto = crypto();
        let now = Utc::now();
        let ttl = chrono::Duration::minutes(10);
        let state = issue_state(&crypto, "user-1", Platform::Facebook, now).unwrap();

        assert!(verify_state(&crypto, &state, "user-1", Platform::Facebook, ttl, now).is_ok());
        assert!(matches!(
            verify_state(&crypto, &state, "user-2", Platform::Facebook, ttl, now),
            Err(LinkError::InvalidState)
        ));
        assert!(matches!(
            verify_state(&crypto, &state, "user-1", Platform::Twitter, ttl, now),
            Err(LinkError::InvalidState)
        ));
    }

    #[test]
    fn stale_state_is_expired() {
        let crypto = crypto();
        let issued = Utc::now() - chrono::Duration::minutes(11);
        let state = issue_state(&crypto, "user-1", Platform::Linkedin, issued).unwrap();
        assert!(matches!(
            verify_state(
                &crypto,
                &state,
                "user-1",
                Platform::Linkedin,
                chrono::Duration::minutes(10),
                Utc::now()
            ),
            Err(LinkError::Expired)
        ));
    }

    #[test]
    fn states_are_unique_per_issue() {
        let crypto = crypto();
        let now = Utc::now();
        let a = issue_state(&crypto, "user-1", Platform::Twitter, now).unwrap();
        let b = issue_state(&crypto, "user-1", Platform::Twitter, now).unwrap();
        assert_ne!(a, b);
    }
}
