//! The two boundaries a submission crosses.
//!
//! ## Data Flow
//!
//! ```text
//! UploadedFile ──▶ UploadRelay ──▶ {"id": …} ──▶ WorkflowRelay ──▶ raw JSON
//!                  (multipart)                   (JSON invocation)
//! ```
//!
//! Both relays are pass-through: they return the remote JSON body unchanged
//! on success and never interpret it. Interpretation (the `id` field, the
//! result shape) belongs to [`crate::orchestrator`].
//!
//! Implementations:
//!
//! 1. [`upload::DifyUploadRelay`] / [`workflow::DifyWorkflowRelay`] hold the
//!    API key and talk to the Dify API directly
//! 2. [`client::RelayClient`] talks to a relay server ([`crate::server`])
//!    that holds the key instead

pub mod client;
pub mod upload;
pub mod workflow;

use crate::error::RelayError;
use crate::file::UploadedFile;
use crate::invocation::WorkflowInvocation;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

/// Forwards a file to the remote store.
#[async_trait]
pub trait UploadRelay: Send + Sync {
    /// Upload `file`; on success return the store's JSON body unchanged.
    async fn upload(&self, file: &UploadedFile) -> Result<Value, RelayError>;
}

/// Forwards an invocation to the remote workflow engine.
#[async_trait]
pub trait WorkflowRelay: Send + Sync {
    /// Send `body` as the request unchanged; on success return the engine's
    /// JSON body unchanged.
    async fn run_body(&self, body: &Value) -> Result<Value, RelayError>;

    /// Run the workflow for a typed invocation.
    async fn run(&self, invocation: &WorkflowInvocation) -> Result<Value, RelayError> {
        let body = serde_json::to_value(invocation).map_err(|e| RelayError::MalformedRequest {
            detail: e.to_string(),
        })?;
        self.run_body(&body).await
    }
}

/// Which boundary a response came from; only the workflow one knows 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Boundary {
    Upload,
    Workflow,
}

/// Turn an HTTP response into the relayed body or a [`RelayError`].
///
/// Error bodies that are not JSON are wrapped as `{"error": <text>}` so the
/// message still reaches the user.
pub(crate) async fn relay_response(
    url: &str,
    response: reqwest::Response,
    boundary: Boundary,
) -> Result<Value, RelayError> {
    let status = response.status();
    let text = response.text().await.map_err(|e| RelayError::Transport {
        url: url.to_string(),
        source: e,
    })?;

    if status.is_success() {
        return serde_json::from_str(&text).map_err(|e| RelayError::InvalidBody {
            status: status.as_u16(),
            detail: e.to_string(),
        });
    }

    let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| {
        if text.trim().is_empty() {
            Value::Null
        } else {
            json!({ "error": text.trim() })
        }
    });
    warn!("{:?} boundary: HTTP {} from {} — {}", boundary, status, url, body);

    if boundary == Boundary::Workflow && status == reqwest::StatusCode::NOT_FOUND {
        return Err(RelayError::WorkflowNotFound { body });
    }
    Err(RelayError::Remote {
        status: status.as_u16(),
        body,
    })
}

/// Map a `reqwest` send error to [`RelayError::Transport`].
pub(crate) fn transport_error(url: &str) -> impl FnOnce(reqwest::Error) -> RelayError + '_ {
    move |source| RelayError::Transport {
        url: url.to_string(),
        source,
    }
}

/// Multipart form with the file under field `file`.
pub(crate) fn file_form(file: &UploadedFile) -> Result<reqwest::multipart::Form, RelayError> {
    let part = reqwest::multipart::Part::bytes(file.bytes.clone())
        .file_name(file.filename.clone())
        .mime_str(&file.mime_type)
        .map_err(|e| RelayError::MalformedRequest {
            detail: format!("invalid MIME type '{}': {e}", file.mime_type),
        })?;
    Ok(reqwest::multipart::Form::new().part("file", part))
}
