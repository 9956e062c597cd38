//! Bounded-retry acquisition loop.
//!
//! The broker may still be initializing when this service starts (the
//! cold-start ordering problem), so transient failures are retried with a
//! fixed delay up to a bounded attempt count before escalating to fatal.
//! The loop is generic over the attempt so the retry policy is testable
//! without a broker.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::StreamError;

/// Retry policy for subscription acquisition.
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Run `attempt` until it succeeds, a fatal error occurs, or the retry
/// budget is exhausted (which is itself fatal).
pub async fn acquire_with<T, F, Fut>(config: &AcquireConfig, mut attempt: F) -> Result<T, StreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StreamError>>,
{
    let mut last_error = String::new();

    for attempt_no in 1..=config.max_attempts.max(1) {
        match attempt().await {
            Ok(value) => {
                if attempt_no > 1 {
                    info!(attempt = attempt_no, "Subscription acquired after retries");
                }
                return Ok(value);
            }
            Err(err @ StreamError::TransientAcquisition(_)) => {
                warn!(
                    attempt = attempt_no,
                    max_attempts = config.max_attempts,
                    "Acquisition failed, retrying in {:?}: {}",
                    config.retry_delay,
                    err
                );
                last_error = err.to_string();
                if attempt_no < config.max_attempts {
                    tokio::time::sleep(config.retry_delay).await;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(StreamError::FatalAcquisition(format!(
        "retry budget exhausted after {} attempts: {}",
        config.max_attempts, last_error
    )))
}
