//! Client for a relay server.
//!
//! Used when the credential lives on a server ([`crate::server`]) rather than
//! with the caller. Speaks the same two boundaries:
//!
//! * `POST {relay}/files/upload` — multipart `file`
//! * `POST {relay}/workflow` — JSON invocation
//!
//! No credential is sent; the relay adds its own.

use super::{file_form, relay_response, transport_error, Boundary, UploadRelay, WorkflowRelay};
use crate::error::RelayError;
use crate::file::UploadedFile;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Talks to a relay server rooted at `base_url` (e.g. `http://localhost:3000/api`).
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl UploadRelay for RelayClient {
    async fn upload(&self, file: &UploadedFile) -> Result<Value, RelayError> {
        let url = self.url("files/upload");
        debug!("Relay client: POST {} ({})", url, file.filename);
        let response = self
            .client
            .post(&url)
            .multipart(file_form(file)?)
            .send()
            .await
            .map_err(transport_error(&url))?;
        relay_response(&url, response, Boundary::Upload).await
    }
}

#[async_trait]
impl WorkflowRelay for RelayClient {
    async fn run_body(&self, body: &Value) -> Result<Value, RelayError> {
        let url = self.url("workflow");
        debug!("Relay client: POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error(&url))?;
        relay_response(&url, response, Boundary::Workflow).await
    }
}
