//! Bounded waits for model invocations and store calls

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct TimeoutError {
    pub duration: Duration,
    pub operation: String,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Operation '{}' timed out after {:?}",
            self.operation, self.duration
        )
    }
}

impl std::error::Error for TimeoutError {}

/// Per-run timeouts for the two blocking calls of a pair
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    pub invoke_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            invoke_timeout: Duration::from_secs(120),
            store_timeout: Duration::from_secs(30),
        }
    }
}

impl TimeoutPolicy {
    pub fn new(invoke_timeout: Duration, store_timeout: Duration) -> Self {
        Self {
            invoke_timeout,
            store_timeout,
        }
    }

    /// The invoke budget spans the whole retry sequence of one call: every
    /// attempt at the per-attempt timeout plus the backoffs between them.
    pub fn from_config(endpoint: &benchlog_core::EndpointConfig) -> Self {
        let retry = RetryPolicy::from_config(endpoint);
        Self::new(
            retry.worst_case_duration(endpoint.invoke_timeout()),
            endpoint.store_timeout(),
        )
    }

    pub async fn invoke<F, Fut, T, E>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, TimeoutOrError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        timeout_result(self.invoke_timeout, operation_name, operation).await
    }

    pub async fn store<F, Fut, T, E>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, TimeoutOrError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        timeout_result(self.store_timeout, operation_name, operation).await
    }
}

pub async fn with_timeout<F, Fut, T>(
    timeout: Duration,
    operation_name: &str,
    operation: F,
) -> Result<T, TimeoutError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    match tokio::time::timeout(timeout, operation()).await {
        Ok(result) => Ok(result),
        Err(_) => {
            warn!(
                operation = operation_name,
                timeout_ms = timeout.as_millis() as u64,
                "Operation timed out"
            );
            Err(TimeoutError {
                duration: timeout,
                operation: operation_name.to_string(),
            })
        }
    }
}

/// Execute a fallible future with a timeout, keeping the two failures apart
pub async fn timeout_result<F, Fut, T, E>(
    timeout: Duration,
    operation_name: &str,
    operation: F,
) -> Result<T, TimeoutOrError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match with_timeout(timeout, operation_name, operation).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(TimeoutOrError::Error(e)),
        Err(timeout) => Err(TimeoutOrError::Timeout(timeout)),
    }
}

#[derive(Debug)]
pub enum TimeoutOrError<E> {
    Timeout(TimeoutError),
    Error(E),
}

impl<E: std::fmt::Display> std::fmt::Display for TimeoutOrError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutOrError::Timeout(e) => write!(f, "{}", e),
            TimeoutOrError::Error(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TimeoutOrError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimeoutOrError::Timeout(e) => Some(e),
            TimeoutOrError::Error(e) => Some(e),
        }
    }
}
