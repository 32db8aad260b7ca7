//! In-memory account store.
//!
//! Thread-safe via `tokio::sync::RwLock`. Data is lost when the store is
//! dropped; used for local development without PostgreSQL and in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::accounts::{
    AccountInfo, AccountStore, AccountUpsert, LinkedAccount, RefreshCandidate, UpsertOutcome,
    MAX_REFRESH_FAILURES,
};
use crate::auth::ServiceIdentity;
use crate::error::LinkError;
use crate::platforms::Platform;

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor: String,
    pub user_id: String,
    pub event_type: String,
    pub platform: Platform,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, LinkedAccount>,
    events: Vec<AuditEvent>,
}

#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of account rows, connected or not.
    pub async fn count(&self) -> usize {
        self.inner.read().await.accounts.len()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.inner.read().await.events.clone()
    }

    /// Every row for a user, tokens included.
    pub async fn accounts_for(&self, user_id: &str) -> Vec<LinkedAccount> {
        let inner = self.inner.read().await;
        let mut rows: Vec<_> = inner
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }

    /// Force an account's expiry, for exercising the refresh path.
    pub async fn set_expiry(&self, account_id: &str, expires_at: Option<DateTime<Utc>>) {
        if let Some(account) = self.inner.write().await.accounts.get_mut(account_id) {
            account.token_expires_at = expires_at;
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn upsert_account(
        &self,
        _service: &ServiceIdentity,
        upsert: &AccountUpsert,
    ) -> Result<UpsertOutcome, LinkError> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();

        let existing = inner.accounts.values_mut().find(|a| {
            a.user_id == upsert.user_id
                && a.platform == upsert.platform
                && a.provider_user_id == upsert.provider_user_id
        });

        if let Some(account) = existing {
            account.access_token = Some(upsert.access_token.clone());
            if upsert.refresh_token.is_some() {
                account.refresh_token = upsert.refresh_token.clone();
            }
            account.token_expires_at = upsert.token_expires_at;
            account.account_name = upsert.account_name.clone();
            account.account_username = upsert.account_username.clone();
            account.followers_count = upsert.followers_count;
            account.profile_image_url = upsert.profile_image_url.clone();
            account.is_connected = true;
            account.last_synced_at = now;
            account.refresh_failures = 0;
            account.updated_at = now;

            return Ok(UpsertOutcome {
                account_id: account.id.clone(),
                created: false,
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        inner.accounts.insert(
            id.clone(),
            LinkedAccount {
                id: id.clone(),
                user_id: upsert.user_id.clone(),
                platform: upsert.platform,
                provider_user_id: upsert.provider_user_id.clone(),
                access_token: Some(upsert.access_token.clone()),
                refresh_token: upsert.refresh_token.clone(),
                token_expires_at: upsert.token_expires_at,
                account_name: upsert.account_name.clone(),
                account_username: upsert.account_username.clone(),
                followers_count: upsert.followers_count,
                profile_image_url: upsert.profile_image_url.clone(),
                is_connected: true,
                last_synced_at: now,
                refresh_failures: 0,
                created_at: now,
                updated_at: now,
            },
        );

        Ok(UpsertOutcome {
            account_id: id,
            created: true,
        })
    }

    async fn get_account(
        &self,
        _service: &ServiceIdentity,
        account_id: &str,
    ) -> Result<Option<LinkedAccount>, LinkError> {
        Ok(self.inner.read().await.accounts.get(account_id).cloned())
    }

    async fn list_accounts(&self, user_id: &str) -> Result<Vec<AccountInfo>, LinkError> {
        let mut rows: Vec<_> = self
            .accounts_for(user_id)
            .await
            .iter()
            .map(LinkedAccount::info)
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn disconnect_account(&self, user_id: &str, account_id: &str) -> Result<(), LinkError> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(account_id)
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| LinkError::NotFound("linked account".into()))?;

        account.access_token = None;
        account.refresh_token = None;
        account.token_expires_at = None;
        account.is_connected = false;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn expiring_accounts(
        &self,
        _service: &ServiceIdentity,
        within: chrono::Duration,
    ) -> Result<Vec<RefreshCandidate>, LinkError> {
        let horizon = Utc::now() + within;
        let inner = self.inner.read().await;

        Ok(inner
            .accounts
            .values()
            .filter(|a| a.is_connected && a.refresh_failures < MAX_REFRESH_FAILURES)
            .filter(|a| a.token_expires_at.is_some_and(|exp| exp < horizon))
            .filter_map(|a| {
                Some(RefreshCandidate {
                    id: a.id.clone(),
                    user_id: a.user_id.clone(),
                    platform: a.platform,
                    refresh_token: a.refresh_token.clone()?,
                })
            })
            .collect())
    }

    async fn update_refreshed_tokens(
        &self,
        _service: &ServiceIdentity,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), LinkError> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| LinkError::NotFound("linked account".into()))?;

        let now = Utc::now();
        account.access_token = Some(access_token.to_string());
        if let Some(rt) = refresh_token {
            account.refresh_token = Some(rt.to_string());
        }
        account.token_expires_at = expires_at;
        account.refresh_failures = 0;
        account.last_synced_at = now;
        account.updated_at = now;
        Ok(())
    }

    async fn record_refresh_failure(
        &self,
        _service: &ServiceIdentity,
        account_id: &str,
    ) -> Result<(), LinkError> {
        if let Some(account) = self.inner.write().await.accounts.get_mut(account_id) {
            account.refresh_failures += 1;
            account.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_event(
        &self,
        service: &ServiceIdentity,
        user_id: &str,
        event_type: &str,
        platform: Platform,
        metadata: serde_json::Value,
    ) -> Result<(), LinkError> {
        self.inner.write().await.events.push(AuditEvent {
            actor: service.name().to_string(),
            user_id: user_id.to_string(),
            event_type: event_type.to_string(),
            platform,
            metadata,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsert(provider_user_id: &str, access: &str, refresh: Option<&str>) -> AccountUpsert {
        AccountUpsert {
            user_id: "user-1".into(),
            platform: Platform::Twitter,
            provider_user_id: provider_user_id.into(),
            access_token: access.into(),
            refresh_token: refresh.map(String::from),
            token_expires_at: None,
            account_name: "Dev".into(),
            account_username: "dev".into(),
            followers_count: Some(10),
            profile_image_url: None,
        }
    }

    #[tokio::test]
    async fn first_link_creates_connected_row() {
        let store = MemoryAccountStore::new();
        let service = ServiceIdentity::backend();

        let outcome = store
            .upsert_account(&service, &upsert("u1", "enc-a1", Some("enc-r1")))
            .await
            .unwrap();
        assert!(outcome.created);
        assert_eq!(store.count().await, 1);

        let row = store
            .get_account(&service, &outcome.account_id)
            .await
            .unwrap()
            .unwrap();
        assert!(row.is_connected);
        assert_eq!(row.access_token.as_deref(), Some("enc-a1"));
    }

    #[tokio::test]
    async fn relink_updates_in_place_and_keeps_refresh_token() {
        let store = MemoryAccountStore::new();
        let service = ServiceIdentity::backend();

        let first = store
            .upsert_account(&service, &upsert("u1", "enc-a1", Some("enc-r1")))
            .await
            .unwrap();
        let before = store.get_account(&service, &first.account_id).await.unwrap().unwrap();

        let second = store
            .upsert_account(&service, &upsert("u1", "enc-a2", None))
            .await
            .unwrap();

        assert!(!second.created);
        assert_eq!(first.account_id, second.account_id);
        assert_eq!(store.count().await, 1);

        let after = store.get_account(&service, &first.account_id).await.unwrap().unwrap();
        assert_eq!(after.access_token.as_deref(), Some("enc-a2"));
        assert_eq!(after.refresh_token.as_deref(), Some("enc-r1"));
        assert!(after.last_synced_at >= before.last_synced_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn different_provider_identity_is_a_new_row() {
        let store = MemoryAccountStore::new();
        let service = ServiceIdentity::backend();

        store.upsert_account(&service, &upsert("u1", "a", None)).await.unwrap();
        let other = store.upsert_account(&service, &upsert("u2", "b", None)).await.unwrap();
        assert!(other.created);
        assert_eq!(store.count().await, 2);
    }

    #[tokio::test]
    async fn disconnect_is_soft_and_owner_scoped() {
        let store = MemoryAccountStore::new();
        let service = ServiceIdentity::backend();
        let outcome = store
            .upsert_account(&service, &upsert("u1", "a", Some("r")))
            .await
            .unwrap();

        let err = store
            .disconnect_account("someone-else", &outcome.account_id)
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::NotFound(_)));

        store.disconnect_account("user-1", &outcome.account_id).await.unwrap();
        let row = store.get_account(&service, &outcome.account_id).await.unwrap().unwrap();
        assert!(!row.is_connected);
        assert!(row.access_token.is_none());
        assert!(row.refresh_token.is_none());
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn expiring_accounts_skip_failed_and_tokenless_rows() {
        let store = MemoryAccountStore::new();
        let service = ServiceIdentity::backend();
        let soon = Some(Utc::now() + chrono::Duration::minutes(2));

        let with_refresh = store.upsert_account(&service, &upsert("u1", "a", Some("r"))).await.unwrap();
        let without_refresh = store.upsert_account(&service, &upsert("u2", "a", None)).await.unwrap();
        let failing = store.upsert_account(&service, &upsert("u3", "a", Some("r"))).await.unwrap();
        for id in [&with_refresh, &without_refresh, &failing] {
            store.set_expiry(&id.account_id, soon).await;
        }
        for _ in 0..MAX_REFRESH_FAILURES {
            store.record_refresh_failure(&service, &failing.account_id).await.unwrap();
        }

        let due = store
            .expiring_accounts(&service, chrono::Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, with_refresh.account_id);
    }
}
