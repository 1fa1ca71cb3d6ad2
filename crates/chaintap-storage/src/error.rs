use chaintap_core::ChaintapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage handle is closed")]
    Closed,

    #[error("storage operation failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Query(e.to_string())
    }
}

impl From<StorageError> for ChaintapError {
    fn from(e: StorageError) -> Self {
        ChaintapError::storage(e.to_string())
    }
}
