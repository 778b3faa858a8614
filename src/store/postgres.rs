use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AuthError};
use crate::store::{RefreshTokenRecord, RefreshTokenStore, TokenState};

/// Postgres-backed refresh-token store for multi-process deployments.
///
/// Rotation atomicity comes from the database: `consume` is one conditional
/// `UPDATE`, so two concurrent refreshes of the same value race on a single
/// row transition and only one can win.
pub struct PgRefreshTokenStore {
    pool: Arc<PgPool>,
}

#[derive(FromRow)]
struct RefreshTokenRow {
    token: String,
    account_id: Uuid,
    state: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    fn into_record(self) -> Result<RefreshTokenRecord, AppError> {
        let state = TokenState::parse(&self.state).ok_or_else(|| {
            AppError::Storage(format!("unknown refresh token state: {}", self.state))
        })?;
        Ok(RefreshTokenRecord {
            token: self.token,
            account_id: self.account_id,
            state,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

impl PgRefreshTokenStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Build a store with its own pool. The acquire timeout bounds every
    /// storage call; hitting it surfaces as a transient `Storage` error.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token, account_id, state, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.token)
        .bind(record.account_id)
        .bind(record.state.as_str())
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn consume(&self, token: &str) -> Result<RefreshTokenRecord, AppError> {
        let now = Utc::now();

        // Single conditional transition; the WHERE clause is the lock.
        let rotated = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            UPDATE refresh_tokens
            SET state = 'rotated'
            WHERE token = $1 AND state = 'active' AND expires_at > $2
            RETURNING token, account_id, state, created_at, expires_at
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(self.pool.as_ref())
        .await?;

        if let Some(row) = rotated {
            return row.into_record();
        }

        // Lost the race or the token was dead/expired; a second read only
        // classifies the failure, it grants nothing.
        let existing = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT token, account_id, state, created_at, expires_at FROM refresh_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        match existing {
            Some(row) if row.state == "active" && row.expires_at <= now => {
                sqlx::query(
                    "UPDATE refresh_tokens SET state = 'expired' WHERE token = $1 AND state = 'active'",
                )
                .bind(token)
                .execute(self.pool.as_ref())
                .await?;
                Err(AppError::Auth(AuthError::Expired))
            }
            _ => Err(AppError::Auth(AuthError::InvalidToken)),
        }
    }

    async fn revoke(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE refresh_tokens SET state = 'revoked' WHERE token = $1 AND state = 'active'")
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn revoke_all_for_account(&self, account_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET state = 'revoked' WHERE account_id = $1 AND state = 'active'",
        )
        .bind(account_id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }
}
