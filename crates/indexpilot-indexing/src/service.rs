use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::ActionKind;

/// One bounded batch of work for the indexing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Project whose URLs the action operates on.
    pub project_id: String,
    pub action: ActionKind,
    /// Admission cap: the service must not touch more than this many URLs
    /// in this invocation, whatever the provider quota allows.
    pub max_urls: u32,
}

/// Common interface to the indexing service (HTTP in production, scripted
/// implementations in tests).
#[async_trait]
pub trait IndexingService: Send + Sync {
    /// Implementation name for logging and error messages.
    fn name(&self) -> &str;

    /// Perform one bounded action for a project.
    ///
    /// The returned payload is opaque to the scheduler and is stored
    /// verbatim in the schedule's run outcome.
    async fn submit(&self, req: &SubmitRequest) -> Result<serde_json::Value, ServiceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}
