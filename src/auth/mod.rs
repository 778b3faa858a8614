//! Credential and session core.
//!
//! Password hashing with historical-scheme compatibility, access/refresh
//! token lifecycle with rotation, request throttling, and input validation.

mod password;
mod rate_limit;
mod service;
mod tokens;
pub mod validation;

pub use password::PasswordHasher;
pub use rate_limit::{RateLimitConfig, RateLimiter, SCOPE_AUTH, SCOPE_DEFAULT};
pub use service::AuthService;
pub use tokens::{Claims, TokenConfig, TokenPair, TokenService};
