//! Request throttling for the inventory API.
//!
//! The API enforces separate read and write quotas per rolling window;
//! exceeding either gets the client banned for the rest of the window.
//! A token bucket per quota keeps us under both.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// One quota: at most `calls` requests per `period_secs` window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimit {
    pub calls: u32,
    pub period_secs: u64,
}

impl RateLimit {
    /// Default read quota of the inventory API.
    pub fn reads() -> Self {
        Self {
            calls: 120,
            period_secs: 60,
        }
    }

    /// Default write quota of the inventory API.
    pub fn writes() -> Self {
        Self {
            calls: 60,
            period_secs: 60,
        }
    }

    fn refill_per_sec(self) -> f64 {
        f64::from(self.calls) / self.period_secs as f64
    }
}

/// Token bucket for one quota.
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(limit: RateLimit) -> Self {
        Self {
            tokens: f64::from(limit.calls),
            max_tokens: f64::from(limit.calls),
            refill_per_sec: limit.refill_per_sec(),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec)
            .min(self.max_tokens);
        self.last_refill = now;
    }

    /// Take one token, or report how long until one is available.
    fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(needed / self.refill_per_sec))
        }
    }
}

/// Async wrapper that sleeps until a token is available.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(limit)),
        }
    }

    /// Block the task until a request may be sent.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                match bucket.try_acquire() {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            debug!(wait_ms = wait.as_millis() as u64, "rate limited, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}
