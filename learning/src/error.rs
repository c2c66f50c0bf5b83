//! Learning error types.

use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LearningError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A forced commit failed on every attempt; the batch is still buffered.
    #[error("Commit for {key} failed after {attempts} attempts: {source}")]
    CommitExhausted {
        key: String,
        attempts: u32,
        source: StorageError,
    },
}

pub type Result<T> = std::result::Result<T, LearningError>;
