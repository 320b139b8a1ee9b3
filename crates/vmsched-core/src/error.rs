//! Error types for vmsched

use thiserror::Error;

/// Main error type for vmsched
#[derive(Error, Debug)]
pub enum SchedError {
    /// The batch could not be fully placed. The reason is safe to show to
    /// end users and never carries fleet capacity or topology details.
    #[error("No valid host was found. {reason}")]
    NoValidHost { reason: String },

    /// The scheduling call was cancelled before it completed
    #[error("Scheduling cancelled")]
    Cancelled,

    /// The request could not be turned into a request spec
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host state provider failure
    #[error("Host state error: {0}")]
    HostState(String),

    /// Filter chain failure
    #[error("Filter error: {0}")]
    Filter(String),

    /// Weigher chain failure
    #[error("Weigher error: {0}")]
    Weigher(String),

    /// Notification sink failure
    #[error("Notification error: {0}")]
    Notification(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SchedError {
    /// Build a `NoValidHost` error with the given user-facing reason
    pub fn no_valid_host(reason: impl Into<String>) -> Self {
        SchedError::NoValidHost {
            reason: reason.into(),
        }
    }

    /// Whether this is the batch-insufficiency failure
    pub fn is_no_valid_host(&self) -> bool {
        matches!(self, SchedError::NoValidHost { .. })
    }
}

/// Result type for vmsched operations
pub type SchedResult<T> = Result<T, SchedError>;

impl From<serde_json::Error> for SchedError {
    fn from(err: serde_json::Error) -> Self {
        SchedError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for SchedError {
    fn from(err: toml::de::Error) -> Self {
        SchedError::Config(format!("Failed to parse config: {}", err))
    }
}
