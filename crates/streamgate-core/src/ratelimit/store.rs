use crate::error::GateError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// State of one key's window after an increment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRecord {
    /// Requests seen in the current window, including the one just counted
    pub count: u64,
    /// Start of the current window, milliseconds since the Unix epoch
    pub window_start_ms: u64,
    pub limit: u64,
    pub window_ms: u64,
    /// Time left until the window resets, as seen by the store's clock
    pub reset_after_ms: u64,
}

impl WindowRecord {
    pub fn is_allowed(&self) -> bool {
        self.count <= self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.count)
    }
}

/// Shared store holding one window record per key.
///
/// The whole read-or-init, reset-if-expired, increment sequence must be a
/// single atomic operation with respect to every other caller of the same
/// store. Assembling it from separate reads and writes lets concurrent
/// requests slip past the limit.
#[async_trait::async_trait]
pub trait WindowStore: Send + Sync {
    async fn increment_with_window_reset(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<WindowRecord, GateError>;
}

#[async_trait::async_trait]
impl<T: WindowStore + ?Sized> WindowStore for Arc<T> {
    async fn increment_with_window_reset(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<WindowRecord, GateError> {
        (**self).increment_with_window_reset(key, limit, window).await
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    window_start_ms: u64,
    window_ms: u64,
}

impl Entry {
    fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.window_start_ms + self.window_ms
    }
}

/// Expired records are swept once every this many increments
const PURGE_INTERVAL: u64 = 256;

/// In-process store for tests and single-instance deployments.
///
/// Time follows the tokio clock, so paused-time tests can step over window
/// boundaries. Records of ended windows are dropped every few hundred
/// increments, so the map only holds keys seen recently.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    increments: AtomicU64,
    epoch_ms_at_start: u64,
    started: Instant,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let epoch_ms_at_start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            entries: Mutex::new(HashMap::new()),
            increments: AtomicU64::new(0),
            epoch_ms_at_start,
            started: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch_ms_at_start + self.started.elapsed().as_millis() as u64
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>, GateError> {
        self.entries
            .lock()
            .map_err(|_| GateError::limiter_backend("memory store lock poisoned"))
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop records whose window has already ended; stands in for store TTLs.
    pub fn purge_expired(&self) -> Result<usize, GateError> {
        let now = self.now_ms();
        let mut entries = self.lock()?;
        Ok(retain_live(&mut entries, now))
    }
}

#[async_trait::async_trait]
impl WindowStore for MemoryStore {
    async fn increment_with_window_reset(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<WindowRecord, GateError> {
        let now = self.now_ms();
        let window_ms = (window.as_millis() as u64).max(1);

        let mut entries = self.lock()?;
        if (self.increments.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_INTERVAL == 0 {
            let purged = retain_live(&mut entries, now);
            if purged > 0 {
                log::debug!("Purged {purged} expired rate limit windows");
            }
        }

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            count: 0,
            window_start_ms: now,
            window_ms,
        });

        if entry.is_expired(now) {
            entry.count = 0;
            entry.window_start_ms = now;
        }
        entry.window_ms = window_ms;
        entry.count += 1;

        Ok(WindowRecord {
            count: entry.count,
            window_start_ms: entry.window_start_ms,
            limit,
            window_ms,
            reset_after_ms: (entry.window_start_ms + window_ms).saturating_sub(now),
        })
    }
}

fn retain_live(entries: &mut HashMap<String, Entry>, now_ms: u64) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now_ms));
    before - entries.len()
}
