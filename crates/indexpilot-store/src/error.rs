use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Schedule not found: {id}")]
    NotFound { id: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
