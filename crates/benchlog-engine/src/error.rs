use benchlog_adapters::{AdapterError, TimeoutError};
use benchlog_core::CoreError;
use benchlog_store::StoreError;
use thiserror::Error;

use crate::report::FailureKind;

pub type BenchResult<T> = Result<T, BenchError>;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Store access failed: {0}")]
    Store(#[from] StoreError),

    #[error("Model invocation timed out: {0}")]
    InvokeTimeout(TimeoutError),

    #[error("Store access timed out: {0}")]
    StoreTimeout(TimeoutError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BenchError {
    /// Classification used in run reports and logs
    pub fn kind(&self) -> FailureKind {
        match self {
            BenchError::Core(_) => FailureKind::Configuration,
            BenchError::Adapter(AdapterError::Timeout(_)) => FailureKind::Timeout,
            BenchError::Adapter(e) if e.is_parse() => FailureKind::AdapterParse,
            BenchError::Adapter(_) => FailureKind::Invocation,
            BenchError::Store(_) | BenchError::StoreTimeout(_) => FailureKind::StoreAccess,
            BenchError::InvokeTimeout(_) => FailureKind::Timeout,
            BenchError::Serialization(_) => FailureKind::Configuration,
        }
    }
}
