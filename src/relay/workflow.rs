//! Workflow boundary: run the published workflow on an uploaded file.
//!
//! `POST {base}/workflows/run` with a JSON [`crate::WorkflowInvocation`]. The
//! workflow is identified by the API key itself, so a 404 means the key is
//! not bound to a published workflow; that case gets its own error so the
//! user sees something actionable.

use super::{relay_response, transport_error, Boundary, WorkflowRelay};
use crate::config::DocflowConfig;
use crate::error::RelayError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

/// Endpoint path relative to the API base URL.
pub const RUN_PATH: &str = "workflows/run";

/// Workflow relay that calls the Dify API directly with the configured key.
#[derive(Debug, Clone)]
pub struct DifyWorkflowRelay {
    client: reqwest::Client,
    config: DocflowConfig,
}

impl DifyWorkflowRelay {
    pub fn new(config: DocflowConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Share an existing connection pool.
    pub fn with_client(client: reqwest::Client, config: DocflowConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl WorkflowRelay for DifyWorkflowRelay {
    async fn run_body(&self, body: &Value) -> Result<Value, RelayError> {
        let creds = self.config.credentials()?;
        let url = creds.endpoint(RUN_PATH);
        debug!(
            "Workflow relay: POST {} (user {})",
            url,
            body.get("user").and_then(serde_json::Value::as_str).unwrap_or("-")
        );

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(creds.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error(&url))?;

        let body = relay_response(&url, response, Boundary::Workflow).await?;
        info!("Workflow finished in {}ms", start.elapsed().as_millis());
        Ok(body)
    }
}
