use chrono::{DateTime, Utc};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid store identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Invalid continuation token '{0}'")]
    InvalidToken(String),

    /// Records are never overwritten
    #[error("Record for {key} at {date} already exists")]
    Duplicate { key: String, date: DateTime<Utc> },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
