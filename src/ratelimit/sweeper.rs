//! Background sweep of expired rate limit windows.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::limiter::RateLimiter;

/// Floor for the sweep period; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Handle to a running sweep task.
pub(crate) struct Sweeper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn a task that sweeps `limiter` every `interval`.
    ///
    /// The task ends when `parent` is cancelled, when this handle is
    /// cancelled, or when the limiter has been dropped.
    pub(crate) fn spawn(
        limiter: Weak<RateLimiter>,
        interval: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let token = parent.child_token();
        let task_token = token.clone();

        let interval = interval.max(MIN_INTERVAL);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(strong) = limiter.upgrade() else {
                            debug!("Rate limiter dropped, sweeper exiting");
                            break;
                        };
                        strong.sweep();
                    }
                }
            }
        });

        Self { token, handle }
    }

    /// Signal the task to stop without waiting for it.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Signal the task to stop and wait for it to exit.
    pub(crate) async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Rate limit sweeper task failed");
        }
    }
}
