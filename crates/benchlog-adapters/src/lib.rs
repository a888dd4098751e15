//! Model adapters for benchlog.
//!
//! - [`families`]: one request/response adapter per model family
//! - [`invoker`]: the model-serving client and its response metadata
//! - [`retry`] and [`timeout`]: resilience helpers shared with the engine

pub mod families;
pub mod invoker;
pub mod retry;
pub mod timeout;

pub use families::{adapter_for, FamilyAdapter, ParsedResponse};
pub use invoker::{
    HttpModelInvoker, HttpModelInvokerBuilder, Invocation, ModelInvoker, ResponseMetadata,
};
pub use retry::RetryPolicy;
pub use timeout::{timeout_result, with_timeout, TimeoutError, TimeoutOrError, TimeoutPolicy};

use benchlog_core::ModelFamily;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    /// Response did not have the field the family schema expects
    #[error("Unexpected {family} response shape: missing or invalid '{path}'")]
    Parse { family: ModelFamily, path: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Client error ({status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl AdapterError {
    /// Transient failures worth another attempt; client-side errors never are
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdapterError::ConnectionError(_)
                | AdapterError::RequestFailed(_)
                | AdapterError::Throttled(_)
                | AdapterError::ServiceUnavailable(_)
                | AdapterError::Timeout(_)
        )
    }

    /// Whether the failure comes from the response shape rather than the call
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            AdapterError::Parse { .. } | AdapterError::InvalidResponse(_)
        )
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
