//! Upload boundary: send the document to the Dify file store.
//!
//! `POST {base}/files/upload`, multipart field `file`, bearer auth. The
//! store answers `{"id": "...", "name": ..., "size": ..., ...}`; the body is
//! relayed as-is.

use super::{file_form, relay_response, transport_error, Boundary, UploadRelay};
use crate::config::DocflowConfig;
use crate::error::RelayError;
use crate::file::UploadedFile;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

/// Endpoint path relative to the API base URL.
pub const UPLOAD_PATH: &str = "files/upload";

/// Upload relay that calls the Dify API directly with the configured key.
#[derive(Debug, Clone)]
pub struct DifyUploadRelay {
    client: reqwest::Client,
    config: DocflowConfig,
}

impl DifyUploadRelay {
    pub fn new(config: DocflowConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Share an existing connection pool.
    pub fn with_client(client: reqwest::Client, config: DocflowConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl UploadRelay for DifyUploadRelay {
    async fn upload(&self, file: &UploadedFile) -> Result<Value, RelayError> {
        if file.filename.is_empty() {
            return Err(RelayError::MissingFile);
        }
        let creds = self.config.credentials()?;
        let url = creds.endpoint(UPLOAD_PATH);
        debug!("Upload relay: POST {} ({} bytes, {})", url, file.len(), file.mime_type);

        let response = self
            .client
            .post(&url)
            .bearer_auth(creds.api_key)
            .multipart(file_form(file)?)
            .send()
            .await
            .map_err(transport_error(&url))?;

        let body = relay_response(&url, response, Boundary::Upload).await?;
        info!("Uploaded '{}' to file store", file.filename);
        Ok(body)
    }
}
