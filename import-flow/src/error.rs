use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Stage execution failed: {0}")]
    StageFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
