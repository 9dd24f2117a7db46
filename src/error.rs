//! Error types for the edgequake-docflow library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`DocflowError`] — **Submission-level**: what the user sees when a
//!   submission (or a CLI run) cannot produce a result. Returned as
//!   `Err(DocflowError)` from [`crate::orchestrator::Orchestrator::submit`].
//!
//! * [`RelayError`] — **Boundary-level**: one call through the upload or
//!   workflow boundary failed. The relay server turns it into an HTTP
//!   response; the orchestrator folds it into a single [`DocflowError`].
//!
//! Nothing here is fatal to the process. Every failure is scoped to one
//! submission, and nothing is retried.

use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Message shown when the workflow endpoint answers HTTP 404.
pub const WORKFLOW_NOT_FOUND_MESSAGE: &str =
    "workflow not found, or not bound to this API key";

/// All errors a submission can end with.
#[derive(Debug, Error)]
pub enum DocflowError {
    // ── Caught before any I/O ─────────────────────────────────────────────
    /// The submission is missing something it needs (no file selected).
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// The deployment is missing a required setting.
    #[error("Deployment is misconfigured: {detail}")]
    Configuration { detail: String },

    // ── Remote failures ───────────────────────────────────────────────────
    /// The file-store call failed or returned an unusable body.
    #[error("File upload failed{}: {message}", status_suffix(.status))]
    Upload { status: Option<u16>, message: String },

    /// The workflow call failed (including HTTP 404).
    #[error("Workflow execution failed{}: {message}", status_suffix(.status))]
    Workflow { status: Option<u16>, message: String },

    // ── Local input errors ────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The requested intent is not in the menu.
    #[error("Unknown processing intent '{value}'\nAvailable: {available}")]
    UnknownIntent { value: String, available: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or intent-menu validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocflowError {
    /// True for errors detected before any network call was attempted.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            DocflowError::Validation { .. } | DocflowError::Configuration { .. }
        )
    }

    /// HTTP status reported by the remote side, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            DocflowError::Upload { status, .. } | DocflowError::Workflow { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// A failure at the upload or workflow boundary.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Client errors ─────────────────────────────────────────────────────
    /// The multipart payload had no `file` field.
    #[error("No file found in the upload payload")]
    MissingFile,

    /// The workflow request had no `inputs` object.
    #[error("No workflow inputs found in the request")]
    MissingInputs,

    /// The request body could not be read.
    #[error("Malformed request: {detail}")]
    MalformedRequest { detail: String },

    /// The request body is over the relay server's upload limit.
    #[error("Request body too large: {detail}")]
    PayloadTooLarge { detail: String },

    // ── Server configuration ──────────────────────────────────────────────
    /// A required deployment setting is unset; no request was sent.
    #[error("{setting} is not configured\nSet {env_var} in the deployment environment.")]
    NotConfigured {
        setting: &'static str,
        env_var: &'static str,
    },

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The workflow endpoint returned HTTP 404.
    #[error("Workflow not found (HTTP 404)\nCheck the workflow is published and bound to this API key.")]
    WorkflowNotFound { body: Value },

    /// The remote service answered with a non-success status.
    #[error("Remote service returned HTTP {status}")]
    Remote { status: u16, body: Value },

    /// The request never got an HTTP answer.
    #[error("Request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A success status with a body that is not JSON.
    #[error("Remote service returned an unreadable body (HTTP {status}): {detail}")]
    InvalidBody { status: u16, detail: String },
}

impl RelayError {
    /// HTTP status the relay server answers with for this error.
    pub fn status(&self) -> u16 {
        match self {
            RelayError::MissingFile
            | RelayError::MissingInputs
            | RelayError::MalformedRequest { .. } => 400,
            RelayError::PayloadTooLarge { .. } => 413,
            RelayError::NotConfigured { .. } => 500,
            RelayError::WorkflowNotFound { .. } => 404,
            RelayError::Remote { status, .. } => *status,
            RelayError::Transport { .. } => 500,
            RelayError::InvalidBody { .. } => 502,
        }
    }

    /// The remote error body, when the remote side sent one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            RelayError::WorkflowNotFound { body } | RelayError::Remote { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Pull the most specific human-readable message out of an error body.
///
/// Precedence: `details.message`, then `message`, then `error`. Empty strings
/// are skipped. Dify answers `{code, message, status}`; the relay server
/// answers `{error, details}` with the upstream body under `details`.
pub fn remote_message(body: &Value) -> Option<String> {
    let candidates = [
        body.get("details").and_then(|d| d.get("message")),
        body.get("message"),
        body.get("error"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upload_display_with_status() {
        let e = DocflowError::Upload {
            status: Some(413),
            message: "file too large".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("HTTP 413"), "got: {msg}");
        assert!(msg.contains("file too large"));
    }

    #[test]
    fn workflow_display_without_status() {
        let e = DocflowError::Workflow {
            status: None,
            message: "connection reset".into(),
        };
        assert_eq!(e.to_string(), "Workflow execution failed: connection reset");
    }

    #[test]
    fn preflight_errors() {
        assert!(DocflowError::Validation { reason: "x".into() }.is_preflight());
        assert!(DocflowError::Configuration { detail: "x".into() }.is_preflight());
        assert!(!DocflowError::Upload {
            status: Some(500),
            message: "x".into()
        }
        .is_preflight());
    }

    #[test]
    fn relay_status_mapping() {
        assert_eq!(RelayError::MissingFile.status(), 400);
        assert_eq!(RelayError::MissingInputs.status(), 400);
        assert_eq!(
            RelayError::NotConfigured {
                setting: "API key",
                env_var: "DIFY_API_KEY"
            }
            .status(),
            500
        );
        assert_eq!(RelayError::WorkflowNotFound { body: json!({}) }.status(), 404);
        assert_eq!(
            RelayError::PayloadTooLarge {
                detail: "limit".into()
            }
            .status(),
            413
        );
        assert_eq!(
            RelayError::Remote {
                status: 429,
                body: json!({})
            }
            .status(),
            429
        );
    }

    #[test]
    fn not_configured_names_env_var() {
        let e = RelayError::NotConfigured {
            setting: "API base URL",
            env_var: "DIFY_API_URL",
        };
        assert!(e.to_string().contains("DIFY_API_URL"));
    }

    #[test]
    fn remote_message_prefers_nested_message() {
        let body = json!({
            "error": "workflow failed",
            "message": "outer",
            "details": { "message": "inner" }
        });
        assert_eq!(remote_message(&body).as_deref(), Some("inner"));
    }

    #[test]
    fn remote_message_prefers_message_over_error() {
        let body = json!({ "error": "generic", "message": "specific" });
        assert_eq!(remote_message(&body).as_deref(), Some("specific"));
    }

    #[test]
    fn remote_message_falls_back_to_error() {
        let body = json!({ "error": "generic", "message": "  " });
        assert_eq!(remote_message(&body).as_deref(), Some("generic"));
        assert_eq!(remote_message(&json!({ "code": 7 })), None);
        assert_eq!(remote_message(&json!("plain string")), None);
    }
}
