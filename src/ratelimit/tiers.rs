//! Quota tiers per identity class.
//!
//! NFT holders and credential users are limited by two independent
//! limiters with their own quotas. Which one applies is decided by the
//! identity class read from the caller's token.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::limiter::{LimitConfig, RateLimiter};
use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitingConfig;
use crate::token::IdentityClass;

/// The pair of long-lived limiters, one per identity class.
#[derive(Debug, Clone)]
pub struct QuotaTiers {
    nft_holder: Arc<RateLimiter>,
    regular: Arc<RateLimiter>,
}

impl QuotaTiers {
    /// Build both tiers from configuration on the system clock.
    pub fn new(config: &RateLimitingConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build both tiers reading time from `clock`.
    pub fn with_clock(config: &RateLimitingConfig, clock: Arc<dyn Clock>) -> Self {
        let nft_holder = LimitConfig::from(&config.nft_holder);
        let regular = LimitConfig::from(&config.regular);

        info!(
            nft_holder_limit = nft_holder.max_requests,
            nft_holder_window = ?nft_holder.window,
            regular_limit = regular.max_requests,
            regular_window = ?regular.window,
            "Quota tiers configured"
        );

        Self {
            nft_holder: Arc::new(RateLimiter::with_clock(
                IdentityClass::NftHolder.as_str(),
                nft_holder,
                clock.clone(),
            )),
            regular: Arc::new(RateLimiter::with_clock(
                IdentityClass::Regular.as_str(),
                regular,
                clock,
            )),
        }
    }

    /// The limiter that applies to `class`.
    pub fn for_class(&self, class: IdentityClass) -> &Arc<RateLimiter> {
        match class {
            IdentityClass::NftHolder => &self.nft_holder,
            IdentityClass::Regular => &self.regular,
        }
    }

    /// Start the sweep task of both tiers.
    pub fn start_sweepers(&self, interval: Duration, shutdown: &CancellationToken) {
        self.nft_holder.start_sweeper(interval, shutdown);
        self.regular.start_sweeper(interval, shutdown);
    }

    /// Stop both sweep tasks and wait for them.
    pub async fn stop_sweepers(&self) {
        futures::join!(self.nft_holder.stop_sweeper(), self.regular.stop_sweeper());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::QuotaConfig;

    fn config() -> RateLimitingConfig {
        RateLimitingConfig {
            nft_holder: QuotaConfig {
                max_requests: 3,
                window_secs: 60,
            },
            regular: QuotaConfig {
                max_requests: 1,
                window_secs: 60,
            },
            sweep_interval_secs: 300,
        }
    }

    #[test]
    fn test_default_quotas() {
        let tiers = QuotaTiers::new(&RateLimitingConfig::default());

        assert_eq!(tiers.for_class(IdentityClass::NftHolder).limit(), 200);
        assert_eq!(tiers.for_class(IdentityClass::Regular).limit(), 50);
        assert_eq!(
            tiers.for_class(IdentityClass::Regular).window(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_tiers_count_independently() {
        let tiers = QuotaTiers::with_clock(&config(), Arc::new(ManualClock::new(0)));

        let regular = tiers.for_class(IdentityClass::Regular);
        assert!(regular.check_limit("same-key").allowed);
        assert!(!regular.check_limit("same-key").allowed);

        let nft = tiers.for_class(IdentityClass::NftHolder);
        let status = nft.check_limit("same-key");
        assert!(status.allowed);
        assert_eq!(status.remaining, 2);
    }

    #[test]
    fn test_tier_names() {
        let tiers = QuotaTiers::new(&config());
        assert_eq!(tiers.for_class(IdentityClass::NftHolder).name(), "nft_holder");
        assert_eq!(tiers.for_class(IdentityClass::Regular).name(), "regular");
    }

    #[tokio::test]
    async fn test_sweepers_start_and_stop() {
        let tiers = QuotaTiers::new(&config());
        let shutdown = CancellationToken::new();

        tiers.start_sweepers(Duration::from_millis(10), &shutdown);
        tokio::time::timeout(Duration::from_secs(1), tiers.stop_sweepers())
            .await
            .unwrap();
    }
}
