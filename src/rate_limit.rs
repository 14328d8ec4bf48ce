/// Rate limiting for admin login attempts and gallery uploads.
///
/// Implements sliding window rate limiting using in-memory storage (DashMap).
/// This is suitable for single-instance deployments.
///
/// Limits come from the `rate_limit` section of the application config and are
/// swapped atomically on reload.
///
/// # Example Usage
///
/// ```rust,ignore
/// use crate::rate_limit::check_login_rate_limit;
///
/// if let Err(e) = check_login_rate_limit("192.168.1.1") {
///     return Err(GalleryError::RateLimited {
///         retry_after_seconds: e.retry_after_seconds,
///     });
/// }
/// ```
use arc_swap::ArcSwap;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config;

/// Global rate limiter instance
pub static RATE_LIMITER: Lazy<Arc<RateLimiter>> = Lazy::new(|| Arc::new(RateLimiter::new()));

/// Global rate limit configuration (hot-reloadable)
static RATE_LIMIT_CONFIG: Lazy<ArcSwap<RateLimitConfig>> =
    Lazy::new(|| ArcSwap::from_pointee(RateLimitConfig::default()));

/// Effective limits, in the shape the limiter consumes.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_max: usize,
    pub login_window: Duration,
    pub upload_max: usize,
    pub upload_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_max: 5,
            login_window: Duration::from_secs(300), // 5 minutes
            upload_max: 20,
            upload_window: Duration::from_secs(60), // 1 minute
        }
    }
}

impl RateLimitConfig {
    pub fn from_config(config: &app_config::RateLimitConfig) -> Self {
        Self {
            login_max: config.login_max_attempts.max(1) as usize,
            login_window: Duration::from_secs(config.login_window_seconds as u64),
            upload_max: config.upload_max.max(1) as usize,
            upload_window: Duration::from_secs(config.upload_window_seconds as u64),
        }
    }
}

/// Initialize rate limits from config (call at startup after loading settings)
pub fn init_rate_limits(config: &app_config::RateLimitConfig) {
    RATE_LIMIT_CONFIG.store(Arc::new(RateLimitConfig::from_config(config)));
    log::info!("Rate limit configuration initialized");
}

/// Get the current rate limit configuration
pub fn get_rate_limit_config() -> Arc<RateLimitConfig> {
    RATE_LIMIT_CONFIG.load_full()
}

/// Rate limiter using in-memory storage
pub struct RateLimiter {
    /// Map of (action_type:identifier) -> Request timestamps
    requests: DashMap<String, Vec<Instant>>,
}

/// Error returned when rate limit is exceeded
#[derive(Debug, Clone)]
pub struct RateLimitError {
    /// Number of seconds until the rate limit resets
    pub retry_after_seconds: u64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
        }
    }

    /// Record a request for `action:identifier` and fail once more than
    /// `max_requests` land inside `window`.
    pub fn check_rate_limit(
        &self,
        action: &str,
        identifier: &str,
        max_requests: usize,
        window: Duration,
    ) -> Result<(), RateLimitError> {
        let key = format!("{}:{}", action, identifier);
        let now = Instant::now();

        let mut entry = self.requests.entry(key).or_default();

        // Sliding window
        entry.retain(|&timestamp| now.duration_since(timestamp) < window);

        if entry.len() >= max_requests {
            let oldest = entry[0];
            let retry_after = window.saturating_sub(now.duration_since(oldest));

            return Err(RateLimitError {
                retry_after_seconds: retry_after.as_secs() + 1, // Round up
            });
        }

        entry.push(now);

        Ok(())
    }

    /// Drop keys with no timestamps left, and timestamps older than `max_age`.
    ///
    /// Called periodically from the server binary.
    pub fn cleanup_old_entries(&self, max_age: Duration) {
        let now = Instant::now();
        self.requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.duration_since(t) < max_age);
            !timestamps.is_empty()
        });
    }

    /// Number of requests within the window for a specific action/identifier
    pub fn get_request_count(&self, action: &str, identifier: &str, window: Duration) -> u32 {
        let key = format!("{}:{}", action, identifier);
        let now = Instant::now();

        if let Some(entry) = self.requests.get(&key) {
            entry
                .iter()
                .filter(|&&timestamp| now.duration_since(timestamp) < window)
                .count() as u32
        } else {
            0
        }
    }

    /// Clear all requests for a specific action/identifier
    pub fn clear_requests(&self, action: &str, identifier: &str) {
        let key = format!("{}:{}", action, identifier);
        self.requests.remove(&key);
    }

    /// Get the number of tracked keys (for monitoring/debugging)
    pub fn tracked_keys_count(&self) -> usize {
        self.requests.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check rate limit for admin login attempts, per client IP.
pub fn check_login_rate_limit(ip: &str) -> Result<(), RateLimitError> {
    let config = get_rate_limit_config();
    RATE_LIMITER.check_rate_limit("login", ip, config.login_max, config.login_window)
}

/// Called on successful login so a typo streak does not lock the admin out.
pub fn clear_login_attempts(ip: &str) {
    RATE_LIMITER.clear_requests("login", ip);
}

/// Check rate limit for gallery uploads, per admin session token.
pub fn check_upload_rate_limit(session_token: &str) -> Result<(), RateLimitError> {
    let config = get_rate_limit_config();
    RATE_LIMITER.check_rate_limit(
        "upload",
        session_token,
        config.upload_max,
        config.upload_window,
    )
}

/// Periodic cleanup entry point for the server's background task.
pub fn cleanup_old_entries_public() {
    let config = get_rate_limit_config();
    let max_age = config.login_window.max(config.upload_window);
    RATE_LIMITER.cleanup_old_entries(max_age);
}
