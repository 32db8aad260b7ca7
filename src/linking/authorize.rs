//! Backend half of the redirect initiator: mint a provider URL and a state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::state::issue_state;
use crate::auth::UserSession;
use crate::crypto::pkce_challenge;
use crate::error::LinkError;
use crate::platforms::Platform;
use crate::AppState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub auth_url: String,
    pub state: String,
    pub platform: Platform,
}

pub fn begin_authorization(
    state: &AppState,
    session: &UserSession,
    req: &AuthorizeRequest,
) -> Result<AuthorizationGrant, LinkError> {
    if req.user_id.is_empty() {
        return Err(LinkError::BadRequest("user_id is required".into()));
    }
    let platform: Platform = req
        .platform
        .parse()
        .map_err(|e| LinkError::BadRequest(format!("{e}")))?;
    session.ensure_owner(&req.user_id)?;

    let provider = state.registry.require(platform)?;

    let signed_state = issue_state(&state.crypto, &req.user_id, platform, Utc::now())?;
    let challenge = if provider.uses_pkce() {
        Some(pkce_challenge(&state.crypto.pkce_verifier(&signed_state)?))
    } else {
        None
    };

    let auth_url = provider.authorize_url(&signed_state, challenge.as_deref());
    info!(user_id = %req.user_id, %platform, "Issued authorization URL");

    Ok(AuthorizationGrant {
        auth_url,
        state: signed_state,
        platform,
    })
}
