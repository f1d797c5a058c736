//! Minimum spacing between outbound requests.
//!
//! A leaky bucket of capacity one: a caller gets a [`Permit`] no earlier than
//! `interval` after the previous permit was handed out. The permit keeps the
//! bucket locked, so concurrent callers queue behind both the wait and the
//! request made while holding it.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{self, Instant};
use tracing::info;

pub struct RateLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

/// Exclusive right to perform one outbound request.
pub struct Permit<'a> {
    _slot: MutexGuard<'a, Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Waits for the bucket, then stamps the attempt time before returning.
    ///
    /// Dropping the returned future while it waits gives up the turn without
    /// consuming the slot.
    pub async fn acquire(&self) -> Permit<'_> {
        let mut slot = self.last.lock().await;
        if let Some(last) = *slot {
            let ready_at = last + self.interval;
            let now = Instant::now();
            if ready_at > now {
                info!(wait_ms = (ready_at - now).as_millis() as u64, "forwarding rate limit, waiting");
                time::sleep_until(ready_at).await;
            }
        }
        *slot = Some(Instant::now());
        Permit { _slot: slot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_permit_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        drop(limiter.acquire().await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_permits_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();
        drop(limiter.acquire().await);
        drop(limiter.acquire().await);
        assert!(start.elapsed() >= Duration::from_millis(500));
        drop(limiter.acquire().await);
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_quiet_period() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        drop(limiter.acquire().await);
        time::sleep(Duration::from_secs(2)).await;
        let before = Instant::now();
        drop(limiter.acquire().await);
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_serializes_concurrent_callers() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await;
                let began = start.elapsed();
                // Simulated request while holding the permit.
                time::sleep(Duration::from_millis(100)).await;
                began
            }));
        }
        let mut began = Vec::new();
        for handle in handles {
            began.push(handle.await.unwrap());
        }
        began.sort();
        for pair in began.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }
}
