//! Randomized pause between consecutive queries.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Holds the batch back between two consecutive queries.
#[async_trait]
pub trait Pause: Send + Sync {
    /// Wait before the next query is sent.
    async fn wait(&self);
}

/// Sleeps a random duration between two bounds.
#[derive(Clone, Copy, Debug)]
pub struct RateLimiter {
    min: Duration,
    max: Duration,
}

impl RateLimiter {
    /// Create a limiter pausing within `[min, max)`.
    #[must_use]
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Pick the next pause, uniformly within the bounds.
    ///
    /// Collapses to `min` when the range is empty.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        let secs = rand::thread_rng().gen_range(self.min.as_secs_f64()..self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

#[async_trait]
impl Pause for RateLimiter {
    /// Sleep for one randomized pause.
    async fn wait(&self) {
        let delay = self.next_delay();
        tracing::debug!("Waiting {:.1} seconds", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}
