//! Relay server: the upload and workflow boundaries over HTTP.
//!
//! Holds the API key so callers don't have to. Routes:
//!
//! | Route | Body | Delegates to |
//! |-------|------|--------------|
//! | `POST /api/files/upload` | multipart, field `file` | [`UploadRelay`] |
//! | `POST /api/workflow` | JSON `{inputs, response_mode?, user?, …}` | [`WorkflowRelay`] |
//! | `GET  /api/health` | — | — |
//!
//! Request and success bodies are relayed unchanged, apart from the
//! `response_mode` / `user` defaults. Every failure, including a body axum
//! cannot parse, answers JSON `{"error": "...", "details": <remote body>?}`
//! with [`RelayError::status`].

use crate::config::DocflowConfig;
use crate::error::{remote_message, RelayError};
use crate::file::{mime_type_for, UploadedFile};
use crate::invocation::{ResponseMode, ANONYMOUS_USER};
use crate::relay::upload::DifyUploadRelay;
use crate::relay::workflow::DifyWorkflowRelay;
use crate::relay::{UploadRelay, WorkflowRelay};
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared handler state.
#[derive(Clone)]
pub struct RelayState {
    pub upload: Arc<dyn UploadRelay>,
    pub workflow: Arc<dyn WorkflowRelay>,
}

impl RelayState {
    /// State whose relays call the Dify API with `config`'s credentials.
    pub fn from_config(config: &DocflowConfig) -> Self {
        let client = reqwest::Client::new();
        Self {
            upload: Arc::new(DifyUploadRelay::with_client(client.clone(), config.clone())),
            workflow: Arc::new(DifyWorkflowRelay::with_client(client, config.clone())),
        }
    }
}

/// Build the router. `max_upload_bytes` caps request bodies.
pub fn router(state: RelayState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/files/upload", post(upload_file))
        .route("/api/workflow", post(run_workflow))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the relay on `listener` until the process is stopped.
pub async fn serve(listener: TcpListener, config: &DocflowConfig) -> std::io::Result<()> {
    // Report settings presence only; the key itself is never logged.
    info!(
        "Relay configured: base URL set: {}, API key set: {}",
        config.api_base_url.is_some(),
        config.api_key.is_some()
    );
    if let Ok(addr) = listener.local_addr() {
        info!("Relay listening on http://{}", addr);
    }
    let app = router(RelayState::from_config(config), config.max_upload_bytes);
    axum::serve(listener, app).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn upload_file(
    State(state): State<RelayState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, RelayError> {
    let multipart = multipart.map_err(|e| rejected(e.status(), e.body_text()))?;
    let file = read_file_field(multipart).await?.ok_or(RelayError::MissingFile)?;
    state.upload.upload(&file).await.map(Json)
}

async fn run_workflow(
    State(state): State<RelayState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, RelayError> {
    let Json(body) = body.map_err(|e| rejected(e.status(), e.body_text()))?;
    let body = with_request_defaults(body)?;
    state.workflow.run_body(&body).await.map(Json)
}

/// Check a client's workflow body and fill in `response_mode` and `user`.
///
/// Everything else is forwarded exactly as received.
fn with_request_defaults(mut body: Value) -> Result<Value, RelayError> {
    let fields = body.as_object_mut().ok_or_else(|| RelayError::MalformedRequest {
        detail: "request body must be a JSON object".into(),
    })?;
    match fields.get("inputs") {
        None | Some(Value::Null) => return Err(RelayError::MissingInputs),
        Some(Value::Object(_)) => {}
        Some(_) => {
            return Err(RelayError::MalformedRequest {
                detail: "`inputs` must be a JSON object".into(),
            })
        }
    }
    for (key, default) in [
        ("response_mode", json!(ResponseMode::Blocking)),
        ("user", json!(ANONYMOUS_USER)),
    ] {
        let slot = fields.entry(key).or_insert(Value::Null);
        if slot.is_null() {
            *slot = default;
        }
    }
    Ok(body)
}

/// Pull the `file` field out of a multipart body; other fields are ignored.
async fn read_file_field(mut multipart: Multipart) -> Result<Option<UploadedFile>, RelayError> {
    let malformed = |e: MultipartError| rejected(e.status(), e.body_text());

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Ok(None);
        }
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| mime_type_for(&filename).to_string());
        let bytes = field.bytes().await.map_err(malformed)?;
        return Ok(Some(UploadedFile::new(bytes.to_vec(), filename, mime_type)));
    }
    Ok(None)
}

/// A request axum could not extract; over-limit bodies keep their 413.
fn rejected(status: StatusCode, detail: String) -> RelayError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::PayloadTooLarge { detail }
    } else {
        RelayError::MalformedRequest { detail }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = match &self {
            RelayError::Remote { body, .. } | RelayError::WorkflowNotFound { body } => {
                let mut out = json!({ "error": self.to_string(), "details": body });
                if let Some(message) = remote_message(body) {
                    out["message"] = Value::String(message);
                }
                out
            }
            RelayError::Transport { .. } => {
                error!("Relay transport failure: {}", self);
                json!({ "error": "Internal server error", "message": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_response_keeps_status_and_details() {
        let e = RelayError::Remote {
            status: 413,
            body: json!({ "code": "file_too_large", "message": "File size exceeded." }),
        };
        let response = e.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn not_configured_is_server_error() {
        let e = RelayError::NotConfigured {
            setting: "API key",
            env_var: "DIFY_API_KEY",
        };
        assert_eq!(e.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn defaults_fill_only_missing_fields() {
        let body = with_request_defaults(json!({
            "inputs": { "doc": { "transfer_method": "local_file", "upload_file_id": "f1", "type": "document", "extra": 1 } },
            "user": null,
            "conversation_id": "c-1"
        }))
        .unwrap();
        assert_eq!(body["response_mode"], "blocking");
        assert_eq!(body["user"], "anonymous");
        assert_eq!(body["conversation_id"], "c-1");
        assert_eq!(body["inputs"]["doc"]["extra"], 1);

        let kept = with_request_defaults(json!({
            "inputs": {},
            "response_mode": "streaming",
            "user": "u-1"
        }))
        .unwrap();
        assert_eq!(kept["response_mode"], "streaming");
        assert_eq!(kept["user"], "u-1");
    }

    #[test]
    fn bad_workflow_bodies_are_client_errors() {
        assert!(matches!(
            with_request_defaults(json!({ "user": "u" })),
            Err(RelayError::MissingInputs)
        ));
        assert!(matches!(
            with_request_defaults(json!({ "inputs": null })),
            Err(RelayError::MissingInputs)
        ));
        assert!(matches!(
            with_request_defaults(json!({ "inputs": [1] })),
            Err(RelayError::MalformedRequest { .. })
        ));
        assert!(matches!(
            with_request_defaults(json!([])),
            Err(RelayError::MalformedRequest { .. })
        ));
    }

    #[test]
    fn over_limit_rejection_is_413() {
        let e = rejected(StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded".into());
        assert_eq!(e.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
        let e = rejected(StatusCode::UNSUPPORTED_MEDIA_TYPE, "no content type".into());
        assert_eq!(e.status(), 400);
    }

    #[test]
    fn workflow_not_found_is_404() {
        let e = RelayError::WorkflowNotFound { body: json!({}) };
        assert_eq!(e.into_response().status(), StatusCode::NOT_FOUND);
    }
}
