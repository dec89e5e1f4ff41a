use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<redis::RedisError> for PersistError {
    fn from(err: redis::RedisError) -> Self {
        PersistError::Unavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
