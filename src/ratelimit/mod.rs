//! Rate limiting logic and state management.

mod counter;
mod key;
mod limiter;
mod sweeper;
mod tiers;

pub use counter::{RateLimitEntry, RateLimitStatus};
pub use key::RateLimitKey;
pub use limiter::{LimitConfig, RateLimiter};
pub use tiers::QuotaTiers;
