//! Background token refresh for linked accounts.
//!
//! Runs every `refresh_interval_secs`. Finds connected accounts whose tokens
//! expire within 10 minutes, refreshes them where the platform supports it,
//! and tracks consecutive failures.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::LinkError;
use crate::AppState;

const REFRESH_WINDOW_MINUTES: i64 = 10;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Start the refresh daemon loop.
pub async fn refresh_daemon(state: Arc<AppState>) {
    let interval = tokio::time::Duration::from_secs(state.config.refresh_interval_secs);
    info!("Token refresh daemon started (interval: {}s)", interval.as_secs());

    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = refresh_cycle(&state).await {
            error!("Refresh cycle error: {e}");
        }
    }
}

pub async fn refresh_cycle(state: &AppState) -> Result<RefreshSummary, LinkError> {
    let mut summary = RefreshSummary::default();
    let expiring = state
        .store
        .expiring_accounts(
            state.service(),
            chrono::Duration::minutes(REFRESH_WINDOW_MINUTES),
        )
        .await?;

    if expiring.is_empty() {
        return Ok(summary);
    }

    info!("Found {} accounts to refresh", expiring.len());

    for account in expiring {
        let Some(provider) = state.registry.get(account.platform) else {
            warn!("Platform {} not onboarded for account {}", account.platform, account.id);
            summary.skipped += 1;
            continue;
        };

        let refresh_token = match state.crypto.decrypt(&account.refresh_token) {
            Ok(token) => token,
            Err(e) => {
                error!("Unreadable refresh token for account {}: {e}", account.id);
                state
                    .store
                    .record_refresh_failure(state.service(), &account.id)
                    .await?;
                summary.failed += 1;
                continue;
            }
        };
        let Some(request) = provider.build_refresh_request(&refresh_token) else {
            debug!("{} does not support refresh, skipping {}", account.platform, account.id);
            summary.skipped += 1;
            continue;
        };

        match state.provider.request_tokens(&request).await {
            Ok(tokens) => {
                let expires_at = tokens.expires_at(Utc::now());
                let access = state.crypto.encrypt(&tokens.access_token)?;
                let refresh = tokens
                    .refresh_token
                    .as_deref()
                    .map(|rt| state.crypto.encrypt(rt))
                    .transpose()?;

                state
                    .store
                    .update_refreshed_tokens(
                        state.service(),
                        &account.id,
                        &access,
                        refresh.as_deref(),
                        expires_at,
                    )
                    .await?;

                info!("Refreshed {} token for account {}", account.platform, account.id);
                summary.refreshed += 1;
            }
            Err(e) => {
                error!("Failed to refresh {} for {}: {e}", account.platform, account.id);
                state
                    .store
                    .record_refresh_failure(state.service(), &account.id)
                    .await?;
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::Platform;
    use crate::store::{AccountStore, AccountUpsert, MemoryAccountStore};
    use crate::test_support;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn seed(
        state: &AppState,
        store: &MemoryAccountStore,
        platform: Platform,
        provider_user_id: &str,
    ) -> String {
        let upsert = AccountUpsert {
            user_id: "user-1".into(),
            platform,
            provider_user_id: provider_user_id.into(),
            access_token: state.crypto.encrypt("old-access").unwrap(),
            refresh_token: Some(state.crypto.encrypt("old-refresh").unwrap()),
            token_expires_at: None,
            account_name: "Dev".into(),
            account_username: "dev".into(),
            followers_count: None,
            profile_image_url: None,
        };
        let outcome = store.upsert_account(state.service(), &upsert).await.unwrap();
        store
            .set_expiry(&outcome.account_id, Some(Utc::now() + chrono::Duration::minutes(1)))
            .await;
        outcome.account_id
    }

    #[tokio::test]
    async fn refreshes_expiring_twitter_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/twitter/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "token_type": "bearer",
                "expires_in": 7200
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryAccountStore::new();
        let state = test_support::app_state(&server.uri(), store.clone());
        let id = seed(&state, &store, Platform::Twitter, "tw-1").await;

        let summary = refresh_cycle(&state).await.unwrap();
        assert_eq!(summary.refreshed, 1);

        let row = store.get_account(state.service(), &id).await.unwrap().unwrap();
        assert_eq!(state.crypto.decrypt(row.access_token.as_deref().unwrap()).unwrap(), "new-access");
        assert_eq!(state.crypto.decrypt(row.refresh_token.as_deref().unwrap()).unwrap(), "new-refresh");
        assert!(row.token_expires_at.unwrap() > Utc::now() + chrono::Duration::minutes(100));
    }

    #[tokio::test]
    async fn failed_refresh_counts_and_platforms_without_refresh_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/linkedin/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
            .mount(&server)
            .await;

        let store = MemoryAccountStore::new();
        let state = test_support::app_state(&server.uri(), store.clone());
        let li = seed(&state, &store, Platform::Linkedin, "li-1").await;
        seed(&state, &store, Platform::Facebook, "fb-1").await;

        let summary = refresh_cycle(&state).await.unwrap();
        assert_eq!(
            summary,
            RefreshSummary {
                refreshed: 0,
                failed: 1,
                skipped: 1
            }
        );

        let row = store.get_account(state.service(), &li).await.unwrap().unwrap();
        assert_eq!(row.refresh_failures, 1);
    }

    #[tokio::test]
    async fn oversized_lifetime_on_refresh_clears_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/linkedin/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new-access",
                "expires_in": 18446744073709551u64
            })))
            .mount(&server)
            .await;

        let store = MemoryAccountStore::new();
        let state = test_support::app_state(&server.uri(), store.clone());
        let id = seed(&state, &store, Platform::Linkedin, "li-1").await;

        let summary = refresh_cycle(&state).await.unwrap();
        assert_eq!(summary.refreshed, 1);

        let row = store.get_account(state.service(), &id).await.unwrap().unwrap();
        assert!(row.token_expires_at.is_none());
        assert_eq!(row.refresh_failures, 0);
        assert_eq!(state.crypto.decrypt(row.refresh_token.as_deref().unwrap()).unwrap(), "old-refresh");
    }
}
