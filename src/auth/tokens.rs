use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, AuthError};
use crate::store::{RefreshTokenRecord, RefreshTokenStore};

/// Access-token claims: account id, expiry, issued-at. Nothing else — the
/// token is a stateless proof of authentication, not a data bag.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    jwt_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenConfig {
    /// Lifetimes are tunables, but access < refresh is a hard invariant: an
    /// access token must never outlive the refresh token that issued it.
    pub fn new(
        jwt_secret: impl Into<String>,
        access_minutes: i64,
        refresh_days: i64,
    ) -> Result<Self, AppError> {
        let access_ttl = Duration::minutes(access_minutes);
        let refresh_ttl = Duration::days(refresh_days);
        if access_ttl <= Duration::zero() || refresh_ttl <= Duration::zero() {
            return Err(AppError::Config("token lifetimes must be positive".to_string()));
        }
        if access_ttl >= refresh_ttl {
            return Err(AppError::Config(
                "access token lifetime must be shorter than refresh token lifetime".to_string(),
            ));
        }
        Ok(Self {
            jwt_secret: jwt_secret.into(),
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn from_settings(auth: &AuthConfig) -> Result<Self, AppError> {
        Self::new(
            auth.jwt_secret.clone(),
            auth.access_token_expire_minutes,
            auth.refresh_token_expire_days,
        )
    }
}

/// The pair handed back on login and refresh, with expiry instants for the
/// boundary layer to surface to clients.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Issues, rotates and revokes session tokens.
///
/// Access tokens are stateless HS256 JWTs verified by signature and expiry
/// alone; refresh tokens are opaque high-entropy values persisted in the
/// [`RefreshTokenStore`].
pub struct TokenService {
    store: Arc<dyn RefreshTokenStore>,
    config: TokenConfig,
}

impl TokenService {
    pub fn new(store: Arc<dyn RefreshTokenStore>, config: TokenConfig) -> Self {
        Self { store, config }
    }

    /// Issue a fresh access/refresh pair for an account. No prior token is
    /// touched.
    pub async fn issue(&self, account_id: Uuid) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        let access_expires_at = now + self.config.access_ttl;
        let access_token = self.encode_access(account_id, now, access_expires_at)?;

        let refresh_token = generate_token_value();
        let record = RefreshTokenRecord::new(refresh_token.clone(), account_id, self.config.refresh_ttl);
        let refresh_expires_at = record.expires_at;
        self.store.insert(&record).await?;

        info!(account_id = %account_id, "issued session token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Exchange a refresh token for a new pair, retiring the old token.
    ///
    /// Rotation-on-use is mandatory: the store transition and this issuance
    /// are a single logical step, and the old value never validates again,
    /// even if replayed before the new pair is used.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let consumed = self.store.consume(refresh_token).await?;
        info!(account_id = %consumed.account_id, "rotated refresh token");
        self.issue(consumed.account_id).await
    }

    /// Revoke a refresh token. Idempotent: unknown or already-dead tokens
    /// are a no-op.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), AppError> {
        self.store.revoke(refresh_token).await
    }

    /// Revoke every outstanding refresh token for an account.
    pub async fn revoke_all(&self, account_id: Uuid) -> Result<u64, AppError> {
        let revoked = self.store.revoke_all_for_account(account_id).await?;
        info!(account_id = %account_id, revoked, "revoked all sessions for account");
        Ok(revoked)
    }

    /// Verify an access token by signature and expiry only; no storage
    /// lookup. Returns the owning account id.
    pub fn validate_access(&self, access_token: &str) -> Result<Uuid, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(
            access_token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken,
        })?;

        Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidToken.into())
    }

    fn encode_access(
        &self,
        account_id: Uuid,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: account_id.to_string(),
            exp: expires_at.timestamp(),
            iat: issued_at.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("access token encoding failed: {e}")))
    }
}

/// 32 random bytes, URL-safe base64. Unique across all time for any
/// realistic issuance volume.
fn generate_token_value() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRefreshTokenStore;

    fn service() -> TokenService {
        TokenService::new(
            Arc::new(InMemoryRefreshTokenStore::new()),
            TokenConfig::new("test_secret", 30, 7).unwrap(),
        )
    }

    #[test]
    fn test_config_rejects_inverted_lifetimes() {
        // 8 days of minutes against a 7-day refresh window
        assert!(matches!(
            TokenConfig::new("secret", 8 * 24 * 60, 7),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            TokenConfig::new("secret", 0, 7),
            Err(AppError::Config(_))
        ));
        assert!(TokenConfig::new("secret", 30, 7).is_ok());
    }

    #[tokio::test]
    async fn test_issue_and_validate_access() {
        let service = service();
        let account_id = Uuid::new_v4();
        let pair = service.issue(account_id).await.unwrap();

        assert_eq!(service.validate_access(&pair.access_token).unwrap(), account_id);
        assert!(pair.access_expires_at < pair.refresh_expires_at);
    }

    #[tokio::test]
    async fn test_refresh_rotates_old_token() {
        let service = service();
        let pair = service.issue(Uuid::new_v4()).await.unwrap();

        let pair2 = service.refresh(&pair.refresh_token).await.unwrap();
        assert_ne!(pair.refresh_token, pair2.refresh_token);

        // Replaying the rotated value always fails.
        match service.refresh(&pair.refresh_token).await {
            Err(AppError::Auth(AuthError::InvalidToken)) => (),
            other => panic!("expected InvalidToken, got {other:?}"),
        }

        // The replacement chain keeps working.
        assert!(service.refresh(&pair2.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_unknown_token() {
        let service = service();
        match service.refresh("never-issued").await {
            Err(AppError::Auth(AuthError::InvalidToken)) => (),
            other => panic!("expected InvalidToken, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_revoked_token_cannot_refresh() {
        let service = service();
        let pair = service.issue(Uuid::new_v4()).await.unwrap();

        service.revoke(&pair.refresh_token).await.unwrap();
        // Revoking a dead token again is fine.
        service.revoke(&pair.refresh_token).await.unwrap();

        assert!(matches!(
            service.refresh(&pair.refresh_token).await,
            Err(AppError::Auth(AuthError::InvalidToken))
        ));
    }

    #[test]
    fn test_expired_access_token() {
        let service = service();
        // Well-formed and correctly signed, but already past expiry.
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            exp: (now - Duration::minutes(5)).timestamp(),
            iat: (now - Duration::minutes(35)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test_secret"),
        )
        .unwrap();

        match service.validate_access(&token) {
            Err(AppError::Auth(AuthError::Expired)) => (),
            other => panic!("expected Expired, got {other:?}"),
        }
    }

    #[test]
    fn test_tampered_access_token() {
        let service = service();
        let other = TokenService::new(
            Arc::new(InMemoryRefreshTokenStore::new()),
            TokenConfig::new("different_secret", 30, 7).unwrap(),
        );

        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            exp: (Utc::now() + Duration::minutes(30)).timestamp(),
            iat: Utc::now().timestamp(),
        };
        let forged = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"different_secret"),
        )
        .unwrap();
        // Sanity: the forging service accepts its own token.
        assert!(other.validate_access(&forged).is_ok());

        assert!(matches!(
            service.validate_access(&forged),
            Err(AppError::Auth(AuthError::InvalidToken))
        ));
        assert!(matches!(
            service.validate_access("not.a.jwt"),
            Err(AppError::Auth(AuthError::InvalidToken))
        ));
    }
}
