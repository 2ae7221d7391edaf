use thiserror::Error;

/// Convenience alias for `Result<T, ForgeError>`.
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Error kinds surfaced by the coordination and tool-execution cores.
///
/// Every variant maps to one of the policy rows in the error-handling
/// design: callers decide whether to retry (`Precondition`, `Transient`),
/// treat the failure as final (`InvalidInput`, `NotFound`, `AlreadyExists`),
/// or unwind (`Fatal`).
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("process failed: {0}")]
    ProcessFailure(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("language server connection closed: {0}")]
    ServerClosed(String),

    #[error("fatal startup error: {0}")]
    Fatal(String),

    #[error("configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("substrate error: {0}")]
    Substrate(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ForgeError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
