use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::PasswordHasher;
use crate::auth::rate_limit::{RateLimiter, SCOPE_AUTH};
use crate::auth::tokens::{TokenPair, TokenService};
use crate::auth::validation::ensure_password_strength;
use crate::config::{PasswordConfig, Settings};
use crate::error::{AppError, AuthError};
use crate::store::{AccountStore, RefreshTokenStore};

/// Facade over the credential and session core, carrying the required
/// control flow: every authentication entry point passes the rate limiter
/// before any hashing or token work, so a rejected caller causes no
/// downstream side effects.
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
    limiter: RateLimiter,
    password_policy: PasswordConfig,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
        limiter: RateLimiter,
        password_policy: PasswordConfig,
    ) -> Self {
        Self {
            accounts,
            hasher,
            tokens,
            limiter,
            password_policy,
        }
    }

    /// Wire the service from [`Settings`] and the two shared stores.
    pub fn from_settings(
        settings: &Settings,
        accounts: Arc<dyn AccountStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Result<Self, AppError> {
        use crate::auth::rate_limit::RateLimitConfig;
        use crate::auth::tokens::TokenConfig;

        Ok(Self::new(
            accounts,
            PasswordHasher::new(settings.password.clone(), settings.auth.bcrypt_cost),
            TokenService::new(refresh_tokens, TokenConfig::from_settings(&settings.auth)?),
            RateLimiter::new(RateLimitConfig::from_settings(&settings.rate_limit)),
            settings.password.clone(),
        ))
    }

    /// Authenticate with email and password, issuing a token pair.
    ///
    /// `caller_key` identifies the caller for rate limiting (source address
    /// for unauthenticated traffic). Unknown account, inactive account and
    /// wrong password are indistinguishable to the caller.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        caller_key: &str,
    ) -> Result<TokenPair, AppError> {
        self.limiter.admit(caller_key, SCOPE_AUTH).await?;

        let account = match self.accounts.find_by_email(email).await? {
            Some(account) if account.is_active => account,
            _ => {
                warn!(email, "login attempt for unknown or inactive account");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !self.hasher.verify(password, &account.credential) {
            warn!(account_id = %account.id, "login attempt with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        info!(account_id = %account.id, "login successful");
        self.tokens.issue(account.id).await
    }

    /// Exchange a refresh token for a new pair; the old token dies.
    pub async fn refresh(&self, refresh_token: &str, caller_key: &str) -> Result<TokenPair, AppError> {
        self.limiter.admit(caller_key, SCOPE_AUTH).await?;
        self.tokens.refresh(refresh_token).await
    }

    /// End a session. Idempotent.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        self.tokens.revoke(refresh_token).await
    }

    /// Verify an access token and return the account it belongs to.
    pub fn authorize(&self, access_token: &str) -> Result<Uuid, AppError> {
        self.tokens.validate_access(access_token)
    }

    /// Change an account's password.
    ///
    /// Writes a brand-new credential (the old hash is replaced, never
    /// mutated) and revokes every outstanding session for the account.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        ensure_password_strength(new_password, &self.password_policy)?;

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.verify(current_password, &account.credential) {
            return Err(AuthError::InvalidCredentials.into());
        }

        let credential = self.hasher.hash(new_password)?;
        self.accounts.set_credential(account_id, &credential).await?;

        let revoked = self.tokens.revoke_all(account_id).await?;
        info!(account_id = %account_id, revoked, "password changed");
        Ok(())
    }
}
