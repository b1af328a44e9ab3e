//! Fixed-window counter entries.

/// Per-key state for one fixed window.
///
/// A window opens on the first request from a key (or the first request
/// after the previous window closed) and lasts a fixed duration. Windows are
/// not aligned to wall-clock boundaries and do not slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests admitted in this window
    count: u32,
    /// End of this window, epoch milliseconds
    window_reset_at: u64,
}

impl RateLimitEntry {
    /// Open a new empty window at `now_ms`.
    pub fn new(now_ms: u64, window_ms: u64) -> Self {
        Self {
            count: 0,
            window_reset_at: now_ms.saturating_add(window_ms),
        }
    }

    /// A window is expired strictly after its reset time.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.window_reset_at
    }

    /// Admit one request if the window has room. Denials leave the count untouched.
    pub fn try_admit(&mut self, limit: u32) -> bool {
        if self.count >= limit {
            return false;
        }
        self.count += 1;
        true
    }

    /// Requests left in this window.
    pub fn remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.count)
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn window_reset_at(&self) -> u64 {
        self.window_reset_at
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests left in the current window after this decision
    pub remaining: u32,
    /// When the current window ends, epoch milliseconds
    pub reset_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_empty() {
        let entry = RateLimitEntry::new(1_000, 500);
        assert_eq!(entry.count(), 0);
        assert_eq!(entry.window_reset_at(), 1_500);
        assert_eq!(entry.remaining(3), 3);
    }

    #[test]
    fn test_admit_until_limit() {
        let mut entry = RateLimitEntry::new(0, 1_000);

        assert!(entry.try_admit(2));
        assert!(entry.try_admit(2));
        assert!(!entry.try_admit(2));

        // denial does not count
        assert_eq!(entry.count(), 2);
        assert_eq!(entry.remaining(2), 0);
    }

    #[test]
    fn test_expiry_is_strict() {
        let entry = RateLimitEntry::new(0, 1_000);
        assert!(!entry.is_expired(999));
        assert!(!entry.is_expired(1_000));
        assert!(entry.is_expired(1_001));
    }

    #[test]
    fn test_zero_limit_denies_everything() {
        let mut entry = RateLimitEntry::new(0, 1_000);
        assert!(!entry.try_admit(0));
        assert_eq!(entry.remaining(0), 0);
    }
}
