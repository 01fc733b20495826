use std::time::Duration;

/// Fixed-interval pacing gate for rate-limited endpoints.
///
/// The pause is unconditional once an external call has been made; callers
/// on cached fast paths simply never reach the gate. Pacing policy lives
/// here so the resolver stays a plain search-then-gate composition.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn wait(&self) {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_elapses_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(1500));
        let start = tokio::time::Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_free() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let start = tokio::time::Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
