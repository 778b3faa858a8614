use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::store::{AccountRecord, AccountStore, RefreshTokenRecord, RefreshTokenStore, TokenState};

/// Process-local refresh-token store. Suitable for single-process
/// deployments and tests; multi-process deployments use the Postgres store.
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: Arc<RwLock<HashMap<String, RefreshTokenRecord>>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&record.token) {
            // Token values are 256-bit random; a collision means a bug.
            return Err(AppError::Internal(
                "refresh token value already exists".to_string(),
            ));
        }
        tokens.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn consume(&self, token: &str) -> Result<RefreshTokenRecord, AppError> {
        let now = Utc::now();
        // Check-and-transition under one write lock: at most one caller can
        // move a given token out of `Active`.
        let mut tokens = self.tokens.write().await;
        let record = tokens
            .get_mut(token)
            .ok_or(AppError::Auth(AuthError::InvalidToken))?;

        match record.state {
            TokenState::Active if record.is_expired_at(now) => {
                record.state = TokenState::Expired;
                Err(AppError::Auth(AuthError::Expired))
            }
            TokenState::Active => {
                record.state = TokenState::Rotated;
                Ok(record.clone())
            }
            _ => Err(AppError::Auth(AuthError::InvalidToken)),
        }
    }

    async fn revoke(&self, token: &str) -> Result<(), AppError> {
        let mut tokens = self.tokens.write().await;
        if let Some(record) = tokens.get_mut(token) {
            if record.state == TokenState::Active {
                record.state = TokenState::Revoked;
            }
        }
        Ok(())
    }

    async fn revoke_all_for_account(&self, account_id: Uuid) -> Result<u64, AppError> {
        let mut tokens = self.tokens.write().await;
        let mut revoked = 0;
        for record in tokens.values_mut() {
            if record.account_id == account_id && record.state == TokenState::Active {
                record.state = TokenState::Revoked;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, record| !record.is_expired_at(now));
        Ok((before - tokens.len()) as u64)
    }
}

/// In-memory account store. The real account store is an external
/// collaborator; this stands in for it in tests and single-process setups.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<Uuid, AccountRecord>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, account: AccountRecord) {
        self.accounts.write().await.insert(account.id, account);
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, AppError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AccountRecord>, AppError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn set_credential(&self, account_id: Uuid, credential: &str) -> Result<(), AppError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&account_id)
            .ok_or_else(|| AppError::Storage("account not found".to_string()))?;
        account.credential = credential.to_string();
        Ok(())
    }
}
