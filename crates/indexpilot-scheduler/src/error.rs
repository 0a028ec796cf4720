use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Store failure outside per-schedule processing. Fatal to the tick.
    #[error("Store error: {0}")]
    Store(#[from] indexpilot_store::StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
