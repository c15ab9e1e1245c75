use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces request starts at least `interval` apart across all tasks.
/// Adapters call [`RateLimiter::acquire`] before every HTTP request, so a
/// provider fetch that needs two endpoints spends two slots.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    /// `0` disables throttling.
    pub fn per_minute(requests: u32) -> Self {
        let interval = if requests == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(60) / requests
        };
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for this caller's slot. Slots are handed out under the lock;
    /// the sleep happens outside it.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = (*next).max(now);
            *next = slot + self.interval;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_rpm() {
        assert_eq!(RateLimiter::per_minute(60).interval(), Duration::from_secs(1));
        assert_eq!(RateLimiter::per_minute(5).interval(), Duration::from_secs(12));
        assert!(RateLimiter::per_minute(0).interval().is_zero());
    }

    #[tokio::test]
    async fn test_calls_are_spaced() {
        // 20ms between calls.
        let limiter = RateLimiter::per_minute(3000);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_unlimited_does_not_wait() {
        let limiter = RateLimiter::per_minute(0);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
