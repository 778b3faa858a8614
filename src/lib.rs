pub mod auth;
pub mod config;
pub mod error;
pub mod store;

pub use error::{AppError, AuthError};
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{
    AuthService, PasswordHasher, RateLimitConfig, RateLimiter, TokenConfig, TokenPair,
    TokenService,
};
pub use store::{
    AccountRecord, AccountStore, InMemoryAccountStore, InMemoryRefreshTokenStore,
    PgRefreshTokenStore, RefreshTokenRecord, RefreshTokenStore, TokenState,
};
