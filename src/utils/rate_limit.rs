//! Cooperative request spacing shared by every handle of a client.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Minimum spacing between request starts
///
/// Clones share one limiter, so concurrent operations interleave their requests
/// without waiting on each other's logical progress.
#[derive(Clone)]
pub struct RequestSpacing {
    limiter: Arc<DefaultDirectRateLimiter>,
    interval: Duration,
}

impl fmt::Debug for RequestSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpacing")
            .field("interval", &self.interval)
            .finish()
    }
}

impl RequestSpacing {
    /// `None` for a zero interval, which disables spacing
    pub fn new(interval: Duration) -> Option<Self> {
        let quota = Quota::with_period(interval)?;
        Some(Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next request may start
    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_zero_interval_disables() {
        assert!(RequestSpacing::new(Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn test_clones_share_spacing() {
        let spacing = RequestSpacing::new(Duration::from_millis(50)).unwrap();
        let other = spacing.clone();

        let started = Instant::now();
        spacing.until_ready().await;
        other.until_ready().await;
        spacing.until_ready().await;
        assert!(started.elapsed() >= Duration::from_millis(90));
    }
}
