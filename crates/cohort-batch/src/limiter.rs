//! Token-bucket rate limiter shared by batch workers.

use std::time::Duration;

use cohort_core::BatchConfig;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Refill arithmetic is floating point; a bucket this close to a whole
/// token counts as having one.
const TOKEN_EPSILON: f64 = 1e-9;

const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    updated: Instant,
}

/// Admits at most `permits` acquisitions per `window`, refilling
/// continuously. Starts full, so the first `permits` callers pass at once.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use cohort_batch::limiter::RateLimiter;
///
/// # async fn example() {
/// let limiter = RateLimiter::new(5, Duration::from_secs(60));
/// limiter.acquire().await;
/// # }
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `permits` is clamped to at least 1 and `window` to at least 1ms.
    pub fn new(permits: u32, window: Duration) -> Self {
        let capacity = f64::from(permits.max(1));
        let window = window.max(Duration::from_millis(1));
        Self {
            capacity,
            refill_per_sec: capacity / window.as_secs_f64(),
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                updated: Instant::now(),
            }),
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(
            config.rate_limit,
            Duration::from_secs(config.rate_window_secs),
        )
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.updated).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                bucket.updated = now;

                if bucket.tokens >= 1.0 - TOKEN_EPSILON {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.refill_per_sec)
                    .max(MIN_WAIT)
            };

            debug!(wait_ms = wait.as_millis() as u64, "rate limited");
            tokio::time::sleep(wait).await;
        }
    }
}
