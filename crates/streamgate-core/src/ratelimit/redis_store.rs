//! Redis-backed window store.
//!
//! The increment runs as one Lua script so Redis executes it atomically
//! against every other client, and the window clock is the Redis server's
//! `TIME` so all application instances agree on window boundaries.

use super::store::{WindowRecord, WindowStore};
use crate::error::GateError;
use redis::aio::MultiplexedConnection;
use std::time::Duration;

const INCREMENT_WITH_RESET: &str = r#"
local window_ms = tonumber(ARGV[1])
local time = redis.call('TIME')
local now_ms = tonumber(time[1]) * 1000 + math.floor(tonumber(time[2]) / 1000)
local start = tonumber(redis.call('HGET', KEYS[1], 'window_start'))
if start == nil or now_ms >= start + window_ms then
  start = now_ms
  redis.call('HSET', KEYS[1], 'count', 0, 'window_start', start)
end
local count = redis.call('HINCRBY', KEYS[1], 'count', 1)
local reset_after = start + window_ms - now_ms
redis.call('PEXPIRE', KEYS[1], reset_after)
return {count, start, reset_after}
"#;

/// Window store shared by every instance pointing at the same Redis
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    script: redis::Script,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, GateError> {
        let client = redis::Client::open(url)
            .map_err(|e| GateError::limiter_backend_with_source("Invalid Redis URL", e))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| GateError::limiter_backend_with_source("Failed to connect to Redis", e))?;
        log::debug!("Connected rate limit store to {url}");
        Ok(Self::new(connection))
    }

    pub fn new(connection: MultiplexedConnection) -> Self {
        Self {
            connection,
            script: redis::Script::new(INCREMENT_WITH_RESET),
        }
    }
}

#[async_trait::async_trait]
impl WindowStore for RedisStore {
    async fn increment_with_window_reset(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<WindowRecord, GateError> {
        let window_ms = (window.as_millis() as u64).max(1);
        let mut connection = self.connection.clone();

        let (count, window_start_ms, reset_after_ms): (u64, u64, u64) = self
            .script
            .key(key)
            .arg(window_ms)
            .invoke_async(&mut connection)
            .await
            .map_err(|e| GateError::limiter_backend_with_source("Redis rate limit script failed", e))?;

        Ok(WindowRecord {
            count,
            window_start_ms,
            limit,
            window_ms,
            reset_after_ms,
        })
    }
}
