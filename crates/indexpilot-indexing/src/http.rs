use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::service::{IndexingService, ServiceError, SubmitRequest};

/// Production implementation: POSTs each action to the platform's internal
/// indexing endpoint and returns the response payload verbatim.
pub struct HttpIndexingService {
    client: reqwest::Client,
    base_url: String,
    service_token: Option<String>,
}

impl HttpIndexingService {
    /// Build a client with a per-request timeout. The timeout is the only
    /// bound on action latency; callers are expected to tolerate requests
    /// running up to that long.
    pub fn new(
        base_url: String,
        service_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            service_token,
        })
    }
}

#[async_trait]
impl IndexingService for HttpIndexingService {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, req: &SubmitRequest) -> Result<serde_json::Value, ServiceError> {
        let url = format!("{}/internal/indexing/actions", self.base_url);

        debug!(
            project_id = %req.project_id,
            action = %req.action,
            max_urls = req.max_urls,
            "submitting indexing action"
        );

        let mut request = self.client.post(&url).json(req);
        if let Some(ref token) = self.service_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| {
            // Surface connection errors as Unavailable so logs can tell a down
            // service from a rejecting one
            if e.is_connect() || e.is_timeout() {
                ServiceError::Unavailable(e.to_string())
            } else {
                ServiceError::Http(e)
            }
        })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "indexing service error");
            return Err(ServiceError::Api {
                status,
                message: text,
            });
        }

        resp.json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }
}
