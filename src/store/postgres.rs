//! PostgreSQL-backed account store. Tables:
//! - `linked_accounts`: encrypted provider tokens per (user_id, platform, provider_user_id)
//! - `link_events`: audit log for linking and refresh operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::accounts::{
    AccountInfo, AccountStore, AccountUpsert, LinkedAccount, RefreshCandidate, UpsertOutcome,
    MAX_REFRESH_FAILURES,
};
use crate::auth::ServiceIdentity;
use crate::error::LinkError;
use crate::platforms::Platform;

/// Account store backed by PostgreSQL.
pub struct PgAccountStore {
    pool: PgPool,
}

const ACCOUNT_COLUMNS: &str = r#"
    id::text, user_id, platform, provider_user_id, access_token, refresh_token,
    token_expires_at, account_name, account_username, followers_count,
    profile_image_url, is_connected, last_synced_at, refresh_failures,
    created_at, updated_at
"#;

impl PgAccountStore {
    pub async fn connect(db_url: &str) -> Result<Self, LinkError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(db_url)
            .await
            .map_err(|e| LinkError::Storage(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool })
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<(), LinkError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS linked_accounts (
                id                UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id           TEXT NOT NULL,
                platform          TEXT NOT NULL,
                provider_user_id  TEXT NOT NULL,
                access_token      TEXT,
                refresh_token     TEXT,
                token_expires_at  TIMESTAMPTZ,
                account_name      TEXT NOT NULL DEFAULT '',
                account_username  TEXT NOT NULL DEFAULT '',
                followers_count   BIGINT,
                profile_image_url TEXT,
                is_connected      BOOLEAN NOT NULL DEFAULT true,
                last_synced_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                refresh_failures  INT NOT NULL DEFAULT 0,
                created_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE(user_id, platform, provider_user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS link_events (
                id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                actor       TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                event_type  TEXT NOT NULL,
                platform    TEXT NOT NULL,
                metadata    JSONB DEFAULT '{}',
                created_at  TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_linked_accounts_user ON linked_accounts(user_id, updated_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_linked_accounts_expiry ON linked_accounts(token_expires_at) WHERE is_connected AND refresh_failures < 3",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_link_events_user ON link_events(user_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn parse_platform(raw: &str) -> Result<Platform, LinkError> {
    raw.parse()
        .map_err(|e| LinkError::Storage(format!("corrupt platform column: {e}")))
}

/// Account ids are UUIDs; anything else cannot name a row.
fn parse_account_id(raw: &str) -> Option<String> {
    uuid::Uuid::parse_str(raw).ok().map(|id| id.to_string())
}

fn account_from_row(row: &PgRow) -> Result<LinkedAccount, LinkError> {
    let platform: String = row.try_get(2)?;
    Ok(LinkedAccount {
        id: row.try_get(0)?,
        user_id: row.try_get(1)?,
        platform: parse_platform(&platform)?,
        provider_user_id: row.try_get(3)?,
        access_token: row.try_get(4)?,
        refresh_token: row.try_get(5)?,
        token_expires_at: row.try_get(6)?,
        account_name: row.try_get(7)?,
        account_username: row.try_get(8)?,
        followers_count: row.try_get(9)?,
        profile_image_url: row.try_get(10)?,
        is_connected: row.try_get(11)?,
        last_synced_at: row.try_get(12)?,
        refresh_failures: row.try_get(13)?,
        created_at: row.try_get(14)?,
        updated_at: row.try_get(15)?,
    })
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn upsert_account(
        &self,
        _service: &ServiceIdentity,
        account: &AccountUpsert,
    ) -> Result<UpsertOutcome, LinkError> {
        let row = sqlx::query(
            r#"
            INSERT INTO linked_accounts
                (user_id, platform, provider_user_id, access_token, refresh_token,
                 token_expires_at, account_name, account_username, followers_count,
                 profile_image_url, is_connected, last_synced_at, refresh_failures)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, true, NOW(), 0)
            ON CONFLICT (user_id, platform, provider_user_id)
            DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, linked_accounts.refresh_token),
                token_expires_at = EXCLUDED.token_expires_at,
                account_name = EXCLUDED.account_name,
                account_username = EXCLUDED.account_username,
                followers_count = EXCLUDED.followers_count,
                profile_image_url = EXCLUDED.profile_image_url,
                is_connected = true,
                last_synced_at = NOW(),
                refresh_failures = 0,
                updated_at = NOW()
            RETURNING id::text, (xmax = 0) AS created
            "#,
        )
        .bind(&account.user_id)
        .bind(account.platform.as_str())
        .bind(&account.provider_user_id)
        .bind(&account.access_token)
        .bind(&account.refresh_token)
        .bind(account.token_expires_at)
        .bind(&account.account_name)
        .bind(&account.account_username)
        .bind(account.followers_count)
        .bind(&account.profile_image_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(UpsertOutcome {
            account_id: row.try_get(0)?,
            created: row.try_get(1)?,
        })
    }

    async fn get_account(
        &self,
        _service: &ServiceIdentity,
        account_id: &str,
    ) -> Result<Option<LinkedAccount>, LinkError> {
        let Some(account_id) = parse_account_id(account_id) else {
            return Ok(None);
        };

        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM linked_accounts WHERE id = $1::uuid"
        ))
        .bind(&account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn list_accounts(&self, user_id: &str) -> Result<Vec<AccountInfo>, LinkError> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM linked_accounts WHERE user_id = $1 ORDER BY updated_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| account_from_row(row).map(|a| a.info()))
            .collect()
    }

    async fn disconnect_account(&self, user_id: &str, account_id: &str) -> Result<(), LinkError> {
        let account_id = parse_account_id(account_id)
            .ok_or_else(|| LinkError::NotFound("linked account".into()))?;

        let affected = sqlx::query(
            r#"
            UPDATE linked_accounts
            SET access_token = NULL,
                refresh_token = NULL,
                token_expires_at = NULL,
                is_connected = false,
                updated_at = NOW()
            WHERE id = $1::uuid AND user_id = $2
            "#,
        )
        .bind(&account_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(LinkError::NotFound("linked account".into()));
        }

        Ok(())
    }

    async fn expiring_accounts(
        &self,
        _service: &ServiceIdentity,
        within: chrono::Duration,
    ) -> Result<Vec<RefreshCandidate>, LinkError> {
        let horizon = Utc::now() + within;
        let rows = sqlx::query(
            r#"
            SELECT id::text, user_id, platform, refresh_token
            FROM linked_accounts
            WHERE token_expires_at < $1
              AND is_connected
              AND refresh_failures < $2
              AND refresh_token IS NOT NULL
            "#,
        )
        .bind(horizon)
        .bind(MAX_REFRESH_FAILURES)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let platform: String = row.try_get(2)?;
                Ok(RefreshCandidate {
                    id: row.try_get(0)?,
                    user_id: row.try_get(1)?,
                    platform: parse_platform(&platform)?,
                    refresh_token: row.try_get(3)?,
                })
            })
            .collect()
    }

    async fn update_refreshed_tokens(
        &self,
        _service: &ServiceIdentity,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), LinkError> {
        sqlx::query(
            r#"
            UPDATE linked_accounts
            SET access_token = $1,
                refresh_token = COALESCE($2, refresh_token),
                token_expires_at = $3,
                refresh_failures = 0,
                last_synced_at = NOW(),
                updated_at = NOW()
            WHERE id = $4::uuid
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_refresh_failure(
        &self,
        _service: &ServiceIdentity,
        account_id: &str,
    ) -> Result<(), LinkError> {
        sqlx::query(
            "UPDATE linked_accounts SET refresh_failures = refresh_failures + 1, updated_at = NOW() WHERE id = $1::uuid",
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;
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
        sqlx::query(
            r#"
            INSERT INTO link_events (actor, user_id, event_type, platform, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(service.name())
        .bind(user_id)
        .bind(event_type)
        .bind(platform.as_str())
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
