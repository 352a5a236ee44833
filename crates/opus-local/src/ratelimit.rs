//! Minimum-interval limiter for upstream APIs.
//!
//! arXiv asks for at most one request every 3 seconds
//! (<https://info.arxiv.org/help/api/tou.html>). Waiters are served in arrival order
//! because the tokio mutex is fair.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const ARXIV_MIN_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn arxiv() -> Self {
        Self::new(ARXIV_MIN_INTERVAL)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may be sent. Returns how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        let wait = next
            .map(|t| t.saturating_duration_since(now))
            .unwrap_or_default();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        *next = Some(Instant::now() + self.min_interval);
        wait
    }
}
