//! Fixed-window rate limiting against a shared store.
//!
//! The limiter itself only holds configuration. All coordination between
//! concurrent callers, in this process or in others, happens inside the
//! store's atomic increment.

#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;

use crate::config::RateLimit;
use crate::error::GateError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{Display, EnumString};

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use store::{MemoryStore, WindowRecord, WindowStore};

/// What to do when the store cannot be reached
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FailPolicy {
    /// Let the request through
    Open,
    /// Reject the request
    #[default]
    Closed,
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub limit: u64,
    /// Time until the current window ends
    pub reset_after: Duration,
}

impl RateLimitDecision {
    fn from_record(record: &WindowRecord) -> Self {
        Self {
            allowed: record.is_allowed(),
            remaining: record.remaining(),
            limit: record.limit,
            reset_after: Duration::from_millis(record.reset_after_ms),
        }
    }

    /// HTTP status a handler should use: 200 to proceed, 429 to reject
    pub fn status_code(&self) -> u16 {
        if self.allowed { 200 } else { 429 }
    }

    /// How long a rejected client should wait
    pub fn retry_after(&self) -> Option<Duration> {
        (!self.allowed).then_some(self.reset_after)
    }

    /// Conventional `X-RateLimit-*` and `Retry-After` header values
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let reset_secs = self.reset_after.as_millis().div_ceil(1000).to_string();
        let mut headers = vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", reset_secs.clone()),
        ];
        if !self.allowed {
            headers.push(("Retry-After", reset_secs));
        }
        headers
    }
}

/// Fixed quota of `limit` requests per `window` for every key
#[derive(Clone)]
pub struct FixedWindowRateLimiter {
    store: Arc<dyn WindowStore>,
    limit: u64,
    window: Duration,
    key_prefix: String,
}

impl FixedWindowRateLimiter {
    pub fn new(
        store: impl WindowStore + 'static,
        limit: u64,
        window: Duration,
    ) -> Result<Self, GateError> {
        if limit == 0 {
            return Err(GateError::configuration("Rate limit must be positive"));
        }
        // Stores count in whole milliseconds
        if window.as_millis() == 0 {
            return Err(GateError::configuration(
                "Rate limit window must be at least one millisecond",
            ));
        }

        Ok(Self {
            store: Arc::new(store),
            limit,
            window,
            key_prefix: String::new(),
        })
    }

    pub fn from_config(store: impl WindowStore + 'static, config: &RateLimit) -> Result<Self, GateError> {
        let limiter = Self::new(store, config.limit, config.window())?;
        Ok(match &config.key_prefix {
            Some(prefix) => limiter.with_key_prefix(prefix.as_str()),
            None => limiter,
        })
    }

    /// Namespace keys in a store shared with other limiters
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one request for `key` and decide whether it may proceed.
    ///
    /// Store failures are returned as [`GateError::LimiterBackend`] without
    /// retrying.
    pub async fn check(&self, key: &str) -> Result<RateLimitDecision, GateError> {
        let store_key = format!("{}{key}", self.key_prefix);
        let record = self
            .store
            .increment_with_window_reset(&store_key, self.limit, self.window)
            .await?;

        let decision = RateLimitDecision::from_record(&record);
        if !decision.allowed {
            log::debug!(
                "Rate limit exceeded for {key}: {} requests in window (limit {})",
                record.count,
                self.limit
            );
        }
        Ok(decision)
    }

    /// Like [`check`](Self::check), resolving store failures with `policy`.
    pub async fn check_with_policy(&self, key: &str, policy: FailPolicy) -> RateLimitDecision {
        match self.check(key).await {
            Ok(decision) => decision,
            Err(e) => {
                log::error!("Rate limiter unavailable, failing {policy}: {e}");
                RateLimitDecision {
                    allowed: policy == FailPolicy::Open,
                    remaining: 0,
                    limit: self.limit,
                    reset_after: Duration::ZERO,
                }
            }
        }
    }
}

impl std::fmt::Debug for FixedWindowRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowRateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}
