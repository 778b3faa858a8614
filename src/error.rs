use thiserror::Error;

/// Top-level error type for the credential and session core.
///
/// The embedding router layer owns the HTTP boundary; it is expected to map
/// these variants to status codes via [`AppError::status_hint`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Authentication failures.
///
/// `InvalidCredentials` deliberately covers both "account not found" and
/// "wrong password" so the boundary cannot be used for account enumeration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

// All storage failures are transient from the caller's point of view: safe to
// retry, never silently swallowed.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                AppError::Storage("timed out acquiring a database connection".to_string())
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl AppError {
    /// Suggested HTTP status code for the boundary layer.
    pub fn status_hint(&self) -> u16 {
        match self {
            AppError::Auth(_) => 401,
            AppError::Validation(_) => 400,
            AppError::RateLimited { .. } => 429,
            AppError::Storage(_) => 503,
            AppError::Config(_) | AppError::Internal(_) => 500,
        }
    }
}
