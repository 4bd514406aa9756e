use keepsafe_core::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Exponential backoff policy for remote reads.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Adds up to 25% random delay on top of each backoff.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(20),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Single attempt, for local mirrors where retrying cannot help.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    fn backoff_duration(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_backoff.as_millis() as f64) as u64;

        let jitter_ms = if self.jitter && capped_ms >= 4 {
            rand::thread_rng().gen_range(0..=capped_ms / 4)
        } else {
            0
        };
        Duration::from_millis(capped_ms + jitter_ms)
    }
}

pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Backend(msg) => {
                let msg = msg.to_ascii_lowercase();
                TRANSIENT_MARKERS.iter().any(|marker| msg.contains(marker))
            }
            // A missing object will not appear by asking again.
            _ => false,
        }
    }
}

const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "rate limit",
    "throttl",
    "temporarily unavailable",
    "try again",
    "connection reset",
    "503",
    "429",
];

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached. Returns the last error in the latter cases.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, operation_name: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation = operation_name, attempt = attempt + 1, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        attempt += 1;
        if !error.is_retryable() || attempt >= attempts {
            warn!(
                operation = operation_name,
                attempts = attempt,
                error = %error,
                "Giving up"
            );
            return Err(error);
        }

        let backoff = config.backoff_duration(attempt - 1);
        warn!(
            operation = operation_name,
            attempt,
            max_attempts = attempts,
            backoff_ms = backoff.as_millis() as u64,
            error = %error,
            "Retrying after backoff"
        );
        sleep(backoff).await;
    }
}
