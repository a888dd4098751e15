use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The model id does not map to any known family
    #[error("Unknown model family for model id '{0}'")]
    UnknownFamily(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid rating {0}, expected 0, 1 or 2")]
    InvalidRating(i64),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Configuration problems are surfaced separately from runtime failures
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CoreError::UnknownFamily(_) | CoreError::InvalidConfig(_) | CoreError::Config(_)
        )
    }
}
