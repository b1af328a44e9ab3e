//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::counter::{RateLimitEntry, RateLimitStatus};
use super::key::RateLimitKey;
use super::sweeper::Sweeper;
use crate::clock::{Clock, SystemClock};
use crate::config::QuotaConfig;

/// Configuration for a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    /// Maximum requests admitted per window
    pub max_requests: u32,
    /// Fixed window length
    pub window: Duration,
}

impl LimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

impl From<&QuotaConfig> for LimitConfig {
    fn from(quota: &QuotaConfig) -> Self {
        Self::new(quota.max_requests, quota.window())
    }
}

/// A fixed-window rate limiter over normalized identity keys.
///
/// Each key gets its own counter. The first admitted request opens a window
/// of `window` length; once `now` passes the window's reset time the next
/// request opens a fresh one. Two bursts straddling a window boundary can
/// therefore admit up to twice `max_requests` in a short span.
///
/// The map is sharded, and each check holds its key's shard lock across the
/// read-modify-write, so concurrent checks on one key never lose updates.
pub struct RateLimiter {
    /// Tier name, for logs
    name: String,
    config: LimitConfig,
    entries: DashMap<RateLimitKey, RateLimitEntry>,
    clock: Arc<dyn Clock>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl RateLimiter {
    /// Create a rate limiter on the system clock.
    pub fn new(name: impl Into<String>, config: LimitConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a rate limiter reading time from `clock`.
    pub fn with_clock(name: impl Into<String>, config: LimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config,
            entries: DashMap::new(),
            clock,
            sweeper: Mutex::new(None),
        }
    }

    /// Admission check: count one request against `key` if its window has room.
    pub fn check_limit(&self, key: &str) -> RateLimitStatus {
        let key = RateLimitKey::new(key);
        let now = self.clock.now_ms();
        let window_ms = self.config.window_ms();

        let mut entry = self.entries.entry(key.clone()).or_insert_with(|| {
            debug!(tier = %self.name, key = %key, "Opening rate limit window");
            RateLimitEntry::new(now, window_ms)
        });

        if entry.is_expired(now) {
            trace!(tier = %self.name, key = %key, "Window expired, resetting");
            *entry = RateLimitEntry::new(now, window_ms);
        }

        let allowed = entry.try_admit(self.config.max_requests);
        let status = RateLimitStatus {
            allowed,
            remaining: entry.remaining(self.config.max_requests),
            reset_time_ms: entry.window_reset_at(),
        };
        drop(entry);

        if allowed {
            trace!(
                tier = %self.name,
                key = %key,
                remaining = status.remaining,
                "Request admitted"
            );
        } else {
            debug!(
                tier = %self.name,
                key = %key,
                reset_time_ms = status.reset_time_ms,
                "Rate limit exceeded"
            );
        }

        status
    }

    /// Requests `key` could still make in its current window. Never mutates state.
    pub fn get_remaining_requests(&self, key: &str) -> u32 {
        let key = RateLimitKey::new(key);
        let now = self.clock.now_ms();

        match self.entries.get(&key) {
            Some(entry) if !entry.is_expired(now) => entry.remaining(self.config.max_requests),
            _ => self.config.max_requests,
        }
    }

    /// Drop every entry whose window has closed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            debug!(tier = %self.name, removed, remaining = self.entries.len(), "Swept expired windows");
        }

        removed
    }

    /// Start the periodic sweep task.
    ///
    /// The task holds only a weak reference and stops when `shutdown` is
    /// cancelled, when [`RateLimiter::stop_sweeper`] is called, or when the
    /// limiter is dropped. Starting again replaces the previous task. A zero
    /// `interval` is raised to one millisecond.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration, shutdown: &CancellationToken) {
        let sweeper = Sweeper::spawn(Arc::downgrade(self), interval, shutdown);
        if let Some(previous) = self.sweeper.lock().replace(sweeper) {
            previous.cancel();
        }

        info!(tier = %self.name, interval = ?interval, "Rate limit sweeper started");
    }

    /// Stop the sweep task and wait for it to finish.
    pub async fn stop_sweeper(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
            info!(tier = %self.name, "Rate limit sweeper stopped");
        }
    }

    /// Tier name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum requests per window.
    pub fn limit(&self) -> u32 {
        self.config.max_requests
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.config.window
    }

    /// Number of tracked keys, expired or not.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Clear all entries.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.cancel();
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .finish()
    }
}
