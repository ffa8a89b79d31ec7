use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces requests out so that at most `rate` leave per second, across every
/// worker sharing the limiter.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// rate = requests per second, 0 disables limiting
    pub fn new(rate: u32) -> Self {
        let interval = if rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / rate as f64)
        };

        Self {
            interval,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}
