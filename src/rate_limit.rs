/// Rate limiting for sign-in, voting, commenting and point awards
///
/// Implements sliding window rate limiting using in-memory storage (DashMap).
/// This is suitable for single-instance deployments.
///
/// Defaults come from the `[rate_limit]` section of the application config;
/// database settings named `rate_limit.<action>.max_requests` and
/// `rate_limit.<action>.window_seconds` override them and support hot reload.
///
/// # Example Usage
///
/// ```rust,ignore
/// use crate::rate_limit::check_vote_rate_limit;
///
/// if let Err(e) = check_vote_rate_limit(user.id) {
///     return Err(error::ErrorTooManyRequests(
///         format!("Too many votes. Try again in {} seconds", e.retry_after_seconds)
///     ));
/// }
/// ```
use arc_swap::ArcSwap;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config;
use crate::config::Config;

/// Global rate limiter instance
pub static RATE_LIMITER: Lazy<Arc<RateLimiter>> = Lazy::new(|| Arc::new(RateLimiter::new()));

/// Global rate limit configuration (hot-reloadable)
static RATE_LIMIT_CONFIG: Lazy<ArcSwap<RateLimitConfig>> =
    Lazy::new(|| ArcSwap::from_pointee(RateLimitConfig::default()));

/// Entries with no request newer than this are dropped by cleanup.
const MAX_TRACKED_WINDOW: Duration = Duration::from_secs(3600);

const MINUTE: Duration = Duration::from_secs(60);

/// Effective limits for each rate-limited action
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub auth_max: usize,
    pub auth_window: Duration,
    pub vote_max: usize,
    pub vote_window: Duration,
    pub comment_max: usize,
    pub comment_window: Duration,
    pub comment_vote_max: usize,
    pub comment_vote_window: Duration,
    pub points_max: usize,
    pub points_window: Duration,
    pub pinning_max: usize,
    pub pinning_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::from_app_config(&app_config::RateLimitConfig::default())
    }
}

impl RateLimitConfig {
    /// Per-minute limits from the file/environment configuration
    pub fn from_app_config(limits: &app_config::RateLimitConfig) -> Self {
        Self {
            auth_max: limits.auth_per_minute as usize,
            auth_window: MINUTE,
            vote_max: limits.votes_per_minute as usize,
            vote_window: MINUTE,
            comment_max: limits.comments_per_minute as usize,
            comment_window: MINUTE,
            comment_vote_max: limits.comment_votes_per_minute as usize,
            comment_vote_window: MINUTE,
            points_max: limits.points_per_minute as usize,
            points_window: MINUTE,
            pinning_max: limits.pinning_per_minute as usize,
            pinning_window: MINUTE,
        }
    }

    /// Apply database overrides on top of the file/environment limits
    pub fn from_config(config: &Config) -> Self {
        let base = Self::from_app_config(&app_config::rate_limit());
        let max = |action: &str, default: usize| {
            config.get_int_or(&format!("rate_limit.{}.max_requests", action), default as i64)
                as usize
        };
        let window = |action: &str, default: Duration| {
            Duration::from_secs(config.get_int_or(
                &format!("rate_limit.{}.window_seconds", action),
                default.as_secs() as i64,
            ) as u64)
        };

        Self {
            auth_max: max("auth", base.auth_max),
            auth_window: window("auth", base.auth_window),
            vote_max: max("vote", base.vote_max),
            vote_window: window("vote", base.vote_window),
            comment_max: max("comment", base.comment_max),
            comment_window: window("comment", base.comment_window),
            comment_vote_max: max("comment_vote", base.comment_vote_max),
            comment_vote_window: window("comment_vote", base.comment_vote_window),
            points_max: max("points", base.points_max),
            points_window: window("points", base.points_window),
            pinning_max: max("pinning", base.pinning_max),
            pinning_window: window("pinning", base.pinning_window),
        }
    }
}

/// Initialize rate limits from config (call at startup after loading settings)
pub fn init_rate_limits(config: &Config) {
    RATE_LIMIT_CONFIG.store(Arc::new(RateLimitConfig::from_config(config)));
    log::info!("Rate limit configuration initialized");
}

/// Reload rate limits from config (call when rate limit settings are changed)
pub fn reload_rate_limits(config: &Config) {
    RATE_LIMIT_CONFIG.store(Arc::new(RateLimitConfig::from_config(config)));
    log::info!("Rate limit configuration reloaded");
}

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

    /// Check if a request should be rate limited
    ///
    /// # Arguments
    /// * `action` - The action being rate limited (e.g., "auth", "vote")
    /// * `identifier` - Unique identifier for the requester (e.g., IP address, user ID)
    /// * `max_requests` - Maximum number of requests allowed in the window
    /// * `window` - Time window for the rate limit
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
            let retry_after = entry
                .first()
                .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or(window);

            return Err(RateLimitError {
                retry_after_seconds: retry_after.as_secs() + 1, // Round up
            });
        }

        entry.push(now);

        Ok(())
    }

    /// Drop timestamps older than the longest tracked window and forget
    /// keys left with none.
    pub fn cleanup_old_entries(&self) {
        let now = Instant::now();
        self.requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.duration_since(t) < MAX_TRACKED_WINDOW);
            !timestamps.is_empty()
        });
    }

    /// Number of requests within `window` for an action/identifier
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

    pub fn clear_requests(&self, action: &str, identifier: &str) {
        let key = format!("{}:{}", action, identifier);
        self.requests.remove(&key);
    }

    pub fn tracked_keys_count(&self) -> usize {
        self.requests.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Helper functions for common rate-limited actions
// ============================================================================

/// Sign-in attempts, per IP address
pub fn check_auth_rate_limit(ip: &str) -> Result<(), RateLimitError> {
    let config = get_rate_limit_config();
    RATE_LIMITER.check_rate_limit("auth", ip, config.auth_max, config.auth_window)
}

/// Poll, quiz and prediction votes, per user
pub fn check_vote_rate_limit(user_id: i32) -> Result<(), RateLimitError> {
    let config = get_rate_limit_config();
    RATE_LIMITER.check_rate_limit(
        "vote",
        &user_id.to_string(),
        config.vote_max,
        config.vote_window,
    )
}

/// New comments, per user
pub fn check_comment_rate_limit(user_id: i32) -> Result<(), RateLimitError> {
    let config = get_rate_limit_config();
    RATE_LIMITER.check_rate_limit(
        "comment",
        &user_id.to_string(),
        config.comment_max,
        config.comment_window,
    )
}

/// Comment up/down votes, per user
pub fn check_comment_vote_rate_limit(user_id: i32) -> Result<(), RateLimitError> {
    let config = get_rate_limit_config();
    RATE_LIMITER.check_rate_limit(
        "comment_vote",
        &user_id.to_string(),
        config.comment_vote_max,
        config.comment_vote_window,
    )
}

/// Point awards, per user
pub fn check_points_rate_limit(user_id: i32) -> Result<(), RateLimitError> {
    let config = get_rate_limit_config();
    RATE_LIMITER.check_rate_limit(
        "points",
        &user_id.to_string(),
        config.points_max,
        config.points_window,
    )
}

/// Pinned-comment lookups, per IP address. Each miss may call the language model.
pub fn check_pinning_rate_limit(ip: &str) -> Result<(), RateLimitError> {
    let config = get_rate_limit_config();
    RATE_LIMITER.check_rate_limit("pinning", ip, config.pinning_max, config.pinning_window)
}

/// Called from the periodic maintenance task in the server binary.
pub fn cleanup_old_entries_public() {
    RATE_LIMITER.cleanup_old_entries();
}
