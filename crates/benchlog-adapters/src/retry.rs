use benchlog_core::EndpointConfig;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{AdapterError, AdapterResult};

/// Bounded retry with exponential backoff for transient invocation failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(20),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Policy from the endpoint section of the configuration
    pub fn from_config(endpoint: &EndpointConfig) -> Self {
        Self::new(endpoint.max_attempts)
            .with_backoff(endpoint.initial_backoff(), endpoint.max_backoff())
    }

    /// No retries at all; one attempt per call
    pub fn none() -> Self {
        Self::new(1)
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base_backoff = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);

        let backoff = base_backoff.min(self.max_backoff.as_millis() as f64);

        let backoff = if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..1.5);
            (backoff * jitter_factor).min(self.max_backoff.as_millis() as f64)
        } else {
            backoff
        };

        Duration::from_millis(backoff as u64)
    }

    /// Upper bound on the time `execute` can take when every attempt is
    /// limited to `attempt_timeout`: all attempts plus the largest possible
    /// backoff before each retry.
    pub fn worst_case_duration(&self, attempt_timeout: Duration) -> Duration {
        let max_attempts = self.max_attempts.max(1);
        let backoffs: Duration = (0..max_attempts - 1)
            .map(|attempt| {
                let base = self.initial_backoff.as_millis() as f64
                    * self.backoff_multiplier.powi(attempt as i32);
                let ceiling = if self.jitter { base * 1.5 } else { base };
                Duration::from_millis(ceiling.min(self.max_backoff.as_millis() as f64) as u64)
            })
            .sum();

        attempt_timeout * max_attempts + backoffs
    }

    pub async fn execute<F, Fut, T>(&self, mut f: F) -> AdapterResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = AdapterResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let backoff = self.calculate_backoff(attempt - 1);
                debug!(
                    attempt = attempt + 1,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }

            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "Operation succeeded on retry");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Operation failed"
                    );

                    if !e.is_retryable() {
                        debug!("Error is not retryable, stopping retry attempts");
                        return Err(e);
                    }

                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AdapterError::RequestFailed("All retry attempts failed".to_string())
        }))
    }
}
