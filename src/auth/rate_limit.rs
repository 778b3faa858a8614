use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::RateLimitSettings;
use crate::error::AppError;

/// Scope for login/refresh traffic, the brute-force attack surface.
pub const SCOPE_AUTH: &str = "auth";
/// Scope for everything else.
pub const SCOPE_DEFAULT: &str = "default";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    /// Quota per window, by scope.
    pub limits: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut limits = HashMap::new();
        limits.insert(SCOPE_DEFAULT.to_string(), 100);
        limits.insert(SCOPE_AUTH.to_string(), 10);

        Self {
            window: Duration::minutes(1),
            limits,
        }
    }
}

impl RateLimitConfig {
    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        let mut limits = HashMap::new();
        limits.insert(SCOPE_DEFAULT.to_string(), settings.default_quota);
        limits.insert(SCOPE_AUTH.to_string(), settings.auth_quota);

        Self {
            window: Duration::seconds(settings.window_seconds),
            limits,
        }
    }
}

/// Fixed-window counter state for one `(scope, key)` pair.
#[derive(Debug)]
struct RateBucket {
    window_start: DateTime<Utc>,
    count: u32,
}

/// Request-admission gate keyed by caller identity (account id when
/// authenticated, source address otherwise).
///
/// State is process-local and ephemeral; losing it on restart only relaxes
/// throttling temporarily. Enforcement across processes is approximate by
/// design — the limiter blunts abuse, it is not an accounting system.
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<(String, String), RateBucket>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Admit or reject one request. Rejection carries a retry-after hint;
    /// a caller that waits out the window fully recovers its quota.
    pub async fn admit(&self, key: &str, scope: &str) -> Result<(), AppError> {
        let now = Utc::now();
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry((scope.to_string(), key.to_string()))
            .or_insert(RateBucket {
                window_start: now,
                count: 0,
            });

        if now - bucket.window_start >= self.config.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        let limit = self
            .config
            .limits
            .get(scope)
            .or_else(|| self.config.limits.get(SCOPE_DEFAULT))
            .copied()
            .unwrap_or(100);

        if bucket.count < limit {
            bucket.count += 1;
            Ok(())
        } else {
            let retry_after = (bucket.window_start + self.config.window - now)
                .num_seconds()
                .max(1) as u64;
            warn!(scope, key, retry_after, "rate limit exceeded");
            Err(AppError::RateLimited {
                retry_after_secs: retry_after,
            })
        }
    }

    /// Drop buckets whose window has fully elapsed.
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let mut buckets = self.buckets.write().await;
        buckets.retain(|_, bucket| now - bucket.window_start < self.config.window);
    }
}
