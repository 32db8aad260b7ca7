//! Token exchange and profile normalization.
//!
//! Steps run strictly in order and each failure stops the flow, so an
//! account row is only written after both provider calls succeeded.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::provider::ProviderFailure;
use super::state::verify_state;
use crate::auth::UserSession;
use crate::error::LinkError;
use crate::platforms::{NormalizedProfile, Platform};
use crate::store::{AccountUpsert, UpsertOutcome};
use crate::AppState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub user_id: String,
}

impl ExchangeRequest {
    fn validate(&self) -> Result<(), LinkError> {
        let missing: Vec<&str> = [
            ("code", &self.code),
            ("state", &self.state),
            ("platform", &self.platform),
            ("user_id", &self.user_id),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LinkError::BadRequest(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub success: bool,
    pub user: NormalizedProfile,
}

#[derive(Debug, Clone)]
pub struct LinkResult {
    pub profile: NormalizedProfile,
    pub outcome: UpsertOutcome,
}

/// Exchange an authorization code, fetch and normalize the profile, and
/// upsert the linked account under the service identity.
pub async fn link_account(
    state: &AppState,
    session: &UserSession,
    req: &ExchangeRequest,
) -> Result<LinkResult, LinkError> {
    req.validate()?;
    session.ensure_owner(&req.user_id)?;

    // ── 1. Platform and app credentials ─────────────────────────────────
    let platform: Platform = req
        .platform
        .parse()
        .map_err(|e| LinkError::Configuration(format!("{e}")))?;
    let provider = state.registry.require(platform)?;

    verify_state(
        &state.crypto,
        &req.state,
        &req.user_id,
        platform,
        state.config.state_ttl(),
        Utc::now(),
    )?;

    // ── 2. Code for tokens ──────────────────────────────────────────────
    let verifier = if provider.uses_pkce() {
        Some(state.crypto.pkce_verifier(&req.state)?)
    } else {
        None
    };
    let token_request = provider.build_exchange_request(&req.code, verifier.as_deref());
    let tokens = state
        .provider
        .request_tokens(&token_request)
        .await
        .map_err(|e| {
            warn!(%platform, "Token exchange failed: {e}");
            match e {
                ProviderFailure::Status { body, .. } => LinkError::TokenExchange(body),
                other => LinkError::TokenExchange(other.to_string()),
            }
        })?;

    // ── 3. Profile ──────────────────────────────────────────────────────
    let raw_profile = state
        .provider
        .fetch_profile(&provider.profile_endpoint(), &tokens.access_token)
        .await
        .map_err(|e| {
            warn!(%platform, "Profile fetch failed: {e}");
            LinkError::ProfileFetch(e.to_string())
        })?;
    let profile = provider.normalize_profile(&raw_profile)?;

    // ── 4. Absolute expiry ──────────────────────────────────────────────
    let token_expires_at = tokens.expires_at(Utc::now());

    // ── 5. Upsert ───────────────────────────────────────────────────────
    let upsert = AccountUpsert {
        user_id: req.user_id.clone(),
        platform,
        provider_user_id: profile.id.clone(),
        access_token: state.crypto.encrypt(&tokens.access_token)?,
        refresh_token: tokens
            .refresh_token
            .as_deref()
            .map(|rt| state.crypto.encrypt(rt))
            .transpose()?,
        token_expires_at,
        account_name: profile.name.clone(),
        account_username: profile.username.clone(),
        followers_count: profile.followers_count.and_then(|n| i64::try_from(n).ok()),
        profile_image_url: profile.profile_image_url.clone(),
    };

    let outcome = state
        .store
        .upsert_account(state.service(), &upsert)
        .await
        .map_err(|e| match e {
            LinkError::Storage(_) => e,
            other => LinkError::Storage(other.to_string()),
        })?;

    info!(
        user_id = %req.user_id,
        %platform,
        account_id = %outcome.account_id,
        created = outcome.created,
        "Linked account"
    );

    if let Err(e) = state
        .store
        .record_event(
            state.service(),
            &req.user_id,
            "account.linked",
            platform,
            json!({ "account_id": outcome.account_id, "created": outcome.created }),
        )
        .await
    {
        warn!("Failed to record link event: {e}");
    }

    Ok(LinkResult { profile, outcome })
}
