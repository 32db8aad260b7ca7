//! Linked-account records and the storage seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::ServiceIdentity;
use crate::error::LinkError;
use crate::platforms::Platform;

/// One social account connected by one user.
///
/// Token fields hold ciphertext produced by `CryptoEngine::encrypt`.
#[derive(Debug, Clone)]
pub struct LinkedAccount {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub provider_user_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub account_name: String,
    pub account_username: String,
    pub followers_count: Option<i64>,
    pub profile_image_url: Option<String>,
    pub is_connected: bool,
    pub last_synced_at: DateTime<Utc>,
    pub refresh_failures: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LinkedAccount {
    pub fn info(&self) -> AccountInfo {
        AccountInfo {
            id: self.id.clone(),
            platform: self.platform,
            provider_user_id: self.provider_user_id.clone(),
            account_name: self.account_name.clone(),
            account_username: self.account_username.clone(),
            followers_count: self.followers_count,
            profile_image_url: self.profile_image_url.clone(),
            is_connected: self.is_connected,
            token_expires_at: self.token_expires_at,
            last_synced_at: self.last_synced_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Write model for linking. Identity is `(user_id, platform, provider_user_id)`.
#[derive(Debug, Clone)]
pub struct AccountUpsert {
    pub user_id: String,
    pub platform: Platform,
    pub provider_user_id: String,
    /// Encrypted.
    pub access_token: String,
    /// Encrypted. `None` keeps whatever refresh token the row already has.
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub account_name: String,
    pub account_username: String,
    pub followers_count: Option<i64>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub account_id: String,
    pub created: bool,
}

/// Account metadata safe to hand to the owning user. Never carries tokens.
#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub id: String,
    pub platform: Platform,
    pub provider_user_id: String,
    pub account_name: String,
    pub account_username: String,
    pub followers_count: Option<i64>,
    pub profile_image_url: Option<String>,
    pub is_connected: bool,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub last_synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An account the refresh daemon should renew.
#[derive(Debug, Clone)]
pub struct RefreshCandidate {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    /// Encrypted.
    pub refresh_token: String,
}

/// Refresh daemon gives up on an account after this many consecutive failures.
pub const MAX_REFRESH_FAILURES: i32 = 3;

/// Persistence for linked accounts.
///
/// Methods taking a [`ServiceIdentity`] are the elevated write path used by
/// linking and refresh. User-facing methods are scoped by `user_id`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create or reconnect the row for `(user_id, platform, provider_user_id)`.
    async fn upsert_account(
        &self,
        service: &ServiceIdentity,
        account: &AccountUpsert,
    ) -> Result<UpsertOutcome, LinkError>;

    async fn get_account(
        &self,
        service: &ServiceIdentity,
        account_id: &str,
    ) -> Result<Option<LinkedAccount>, LinkError>;

    async fn list_accounts(&self, user_id: &str) -> Result<Vec<AccountInfo>, LinkError>;

    /// Soft disconnect: null credentials, mark not connected, keep the row.
    async fn disconnect_account(&self, user_id: &str, account_id: &str) -> Result<(), LinkError>;

    async fn expiring_accounts(
        &self,
        service: &ServiceIdentity,
        within: chrono::Duration,
    ) -> Result<Vec<RefreshCandidate>, LinkError>;

    async fn update_refreshed_tokens(
        &self,
        service: &ServiceIdentity,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), LinkError>;

    async fn record_refresh_failure(
        &self,
        service: &ServiceIdentity,
        account_id: &str,
    ) -> Result<(), LinkError>;

    /// Append an audit event.
    async fn record_event(
        &self,
        service: &ServiceIdentity,
        user_id: &str,
        event_type: &str,
        platform: Platform,
        metadata: serde_json::Value,
    ) -> Result<(), LinkError>;
}
