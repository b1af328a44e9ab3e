//! Rate limit key normalization.

use std::fmt;

/// Longest key prefix shown in logs before the rest is elided.
const DISPLAY_PREFIX_LEN: usize = 12;

/// A normalized rate limit key.
///
/// Keys are case-folded so that one logical identity (for example a wallet
/// address written with or without checksum casing) always maps to a single
/// counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    /// Create a normalized key from raw identity text.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    /// The normalized key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RateLimitKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Keys for regular users are whole bearer tokens, so only a prefix is shown.
impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.char_indices().nth(DISPLAY_PREFIX_LEN) {
            Some((idx, _)) => write!(f, "{}...", &self.0[..idx]),
            None => f.write_str(&self.0),
        }
    }
}
