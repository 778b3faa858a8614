//! Shared-state storage for the session core.
//!
//! Both stores are traits so the in-memory implementation (single process)
//! and the Postgres-backed implementation (multi-process deployment) are
//! interchangeable without changing call sites.

mod memory;
mod postgres;

pub use memory::{InMemoryAccountStore, InMemoryRefreshTokenStore};
pub use postgres::PgRefreshTokenStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::AppError;

/// Lifecycle state of a refresh token. `Active` is the only live state; the
/// others are terminal and a token in any of them never validates again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Rotated,
    Revoked,
    Expired,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Active => "active",
            TokenState::Rotated => "rotated",
            TokenState::Revoked => "revoked",
            TokenState::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TokenState::Active),
            "rotated" => Some(TokenState::Rotated),
            "revoked" => Some(TokenState::Revoked),
            "expired" => Some(TokenState::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub account_id: Uuid,
    pub state: TokenState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(token: String, account_id: Uuid, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token,
            account_id,
            state: TokenState::Active,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Persistence for refresh tokens, keyed by token value (unique across all
/// time) with an index on the owning account.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AppError>;

    /// Atomically transition an active, unexpired token to `Rotated` and
    /// return it. At most one concurrent caller can succeed for a given
    /// token value; everyone else observes the token as dead.
    ///
    /// Fails with `AuthError::InvalidToken` for absent or dead tokens and
    /// `AuthError::Expired` for tokens past their expiry.
    async fn consume(&self, token: &str) -> Result<RefreshTokenRecord, AppError>;

    /// Transition a token to `Revoked`. Idempotent: revoking an absent or
    /// already-dead token is a no-op.
    async fn revoke(&self, token: &str) -> Result<(), AppError>;

    /// Kill every outstanding token for an account ("log out everywhere").
    /// Returns the number of tokens revoked.
    async fn revoke_all_for_account(&self, account_id: Uuid) -> Result<u64, AppError>;

    /// Expiry sweep: mark or remove tokens past their expiry. Returns the
    /// number of tokens swept.
    async fn purge_expired(&self) -> Result<u64, AppError>;
}

/// The account record shape this core reads. Accounts are owned by an
/// external collaborator; this core never writes them except the credential.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: Uuid,
    pub email: String,
    /// Stored password hash. Never plaintext.
    pub credential: String,
    pub is_active: bool,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccountRecord>, AppError>;

    /// Replace the account's credential. The only account write this core
    /// performs.
    async fn set_credential(&self, account_id: Uuid, credential: &str) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_state_round_trip() {
        for state in [
            TokenState::Active,
            TokenState::Rotated,
            TokenState::Revoked,
            TokenState::Expired,
        ] {
            assert_eq!(TokenState::parse(state.as_str()), Some(state));
        }
        assert_eq!(TokenState::parse("zombie"), None);
    }

    #[test]
    fn test_record_expiry_is_monotonic() {
        let record = RefreshTokenRecord::new("tok".into(), Uuid::new_v4(), Duration::days(7));
        assert!(record.expires_at > record.created_at);
        assert!(!record.is_expired_at(record.created_at));
        assert!(record.is_expired_at(record.expires_at));
    }
}
