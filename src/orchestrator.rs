//! Upload-then-invoke orchestration.
//!
//! One submission runs these steps, each an await point:
//!
//! ```text
//! validate ──▶ upload ──▶ extract id ──▶ build invocation ──▶ run ──▶ normalise
//!  (no I/O)   (Uploading)                                  (Invoking)  (Done)
//! ```
//!
//! Any failure ends the attempt in `Failed`; there are no retries and no
//! partial state is kept for replay. A successful upload whose workflow call
//! fails has to be resubmitted from scratch.
//!
//! Independent submissions on one [`Orchestrator`] are not serialised. Each
//! builds its invocation from its own file and intent, and whichever finishes
//! last overwrites the displayed result or error.

use crate::config::DocflowConfig;
use crate::error::{remote_message, DocflowError, RelayError, WORKFLOW_NOT_FOUND_MESSAGE};
use crate::file::UploadedFile;
use crate::intent::ProcessingIntent;
use crate::invocation::{generate_user_token, FileReference, WorkflowInvocation};
use crate::progress::SubmissionPhase;
use crate::relay::upload::DifyUploadRelay;
use crate::relay::workflow::DifyWorkflowRelay;
use crate::relay::{UploadRelay, WorkflowRelay};
use crate::result::WorkflowResult;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// What the user currently sees.
///
/// At most one of `result` and `error` is set after a submission finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    pub phase: SubmissionPhase,
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Drives submissions through the upload and workflow relays.
pub struct Orchestrator {
    upload: Arc<dyn UploadRelay>,
    workflow: Arc<dyn WorkflowRelay>,
    config: DocflowConfig,
    display: Mutex<DisplayState>,
}

impl Orchestrator {
    /// Orchestrator that calls the Dify API directly, sharing one HTTP pool.
    pub fn from_config(config: DocflowConfig) -> Self {
        let client = reqwest::Client::new();
        let upload = Arc::new(DifyUploadRelay::with_client(client.clone(), config.clone()));
        let workflow = Arc::new(DifyWorkflowRelay::with_client(client, config.clone()));
        Self::with_relays(config, upload, workflow)
    }

    /// Orchestrator over arbitrary relays (relay server client, test doubles, …).
    pub fn with_relays(
        config: DocflowConfig,
        upload: Arc<dyn UploadRelay>,
        workflow: Arc<dyn WorkflowRelay>,
    ) -> Self {
        Self {
            upload,
            workflow,
            config,
            display: Mutex::new(DisplayState::default()),
        }
    }

    /// Snapshot of what the user currently sees.
    pub fn display(&self) -> DisplayState {
        self.lock_display().clone()
    }

    /// Forget the displayed result and error. Does not abort in-flight calls.
    pub fn clear(&self) {
        *self.lock_display() = DisplayState::default();
    }

    /// Upload `file`, run the workflow for `intent`, and return the decoded result.
    ///
    /// `None` for `file` is a validation error and issues no network call.
    pub async fn submit(
        &self,
        file: Option<UploadedFile>,
        intent: &ProcessingIntent,
    ) -> Result<WorkflowResult, DocflowError> {
        let start = Instant::now();
        let outcome = self.run_submission(file, intent).await;

        match &outcome {
            Ok(result) => {
                let text = result.display_text();
                info!(
                    "Submission '{}' done in {}ms ({} chars)",
                    intent.value,
                    start.elapsed().as_millis(),
                    text.len()
                );
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_submission_complete(text.len());
                }
                self.finish(SubmissionPhase::Done, Some(text), None);
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Submission '{}' failed: {}", intent.value, message);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_submission_error(&message);
                }
                self.finish(SubmissionPhase::Failed, None, Some(message));
            }
        }
        outcome
    }

    async fn run_submission(
        &self,
        file: Option<UploadedFile>,
        intent: &ProcessingIntent,
    ) -> Result<WorkflowResult, DocflowError> {
        // ── Step 1: Validate ─────────────────────────────────────────────────
        let file = file.ok_or_else(|| DocflowError::Validation {
            reason: "no file selected".into(),
        })?;

        // ── Step 2: Upload ───────────────────────────────────────────────────
        self.enter(SubmissionPhase::Uploading);
        info!("Uploading '{}' ({} bytes)", file.filename, file.len());
        let body = self
            .upload
            .upload(&file)
            .await
            .map_err(upload_error)?;

        // ── Step 3: Extract the file reference ───────────────────────────────
        let file_ref = extract_file_reference(&body)?;
        debug!("File store returned id {}", file_ref);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_upload_complete(&file.filename, file_ref.as_str());
        }
        drop(file);

        // ── Step 4: Build the invocation ─────────────────────────────────────
        let invocation = WorkflowInvocation::builder(file_ref, intent)
            .document_input(self.config.document_input.as_str())
            .text_inputs(&self.config.extra_inputs)
            .user(generate_user_token(&self.config.user_prefix))
            .build();

        // ── Step 5: Run the workflow ─────────────────────────────────────────
        self.enter(SubmissionPhase::Invoking);
        let body = self
            .workflow
            .run(&invocation)
            .await
            .map_err(workflow_error)?;

        // ── Step 6: Normalise ────────────────────────────────────────────────
        Ok(WorkflowResult::from_value(body))
    }

    fn enter(&self, phase: SubmissionPhase) {
        self.lock_display().phase = phase;
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase(phase);
        }
    }

    fn finish(&self, phase: SubmissionPhase, result: Option<String>, error: Option<String>) {
        *self.lock_display() = DisplayState {
            phase,
            result,
            error,
        };
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase(phase);
        }
    }

    fn lock_display(&self) -> MutexGuard<'_, DisplayState> {
        // A panic elsewhere cannot leave DisplayState half-written; keep going.
        self.display.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Read `id` from the store's response.
///
/// A 200 with an unexpected body is still an upload failure.
fn extract_file_reference(body: &Value) -> Result<FileReference, DocflowError> {
    body.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(FileReference::new)
        .ok_or_else(|| DocflowError::Upload {
            status: None,
            message: "missing file identifier".into(),
        })
}

fn upload_error(e: RelayError) -> DocflowError {
    match e {
        RelayError::NotConfigured { .. } => DocflowError::Configuration {
            detail: e.to_string(),
        },
        RelayError::MissingFile => DocflowError::Validation {
            reason: "no file selected".into(),
        },
        other => DocflowError::Upload {
            status: remote_status(&other),
            message: remote_detail(&other, "the file store rejected the upload"),
        },
    }
}

fn workflow_error(e: RelayError) -> DocflowError {
    match e {
        RelayError::NotConfigured { .. } => DocflowError::Configuration {
            detail: e.to_string(),
        },
        RelayError::WorkflowNotFound { .. } => DocflowError::Workflow {
            status: Some(404),
            message: WORKFLOW_NOT_FOUND_MESSAGE.into(),
        },
        other => DocflowError::Workflow {
            status: remote_status(&other),
            message: remote_detail(&other, "the workflow engine returned an error"),
        },
    }
}

/// The status the remote answered with; `None` when no answer arrived or the
/// error was raised locally.
fn remote_status(e: &RelayError) -> Option<u16> {
    match e {
        RelayError::Remote { status, .. } | RelayError::InvalidBody { status, .. } => {
            Some(*status)
        }
        RelayError::WorkflowNotFound { .. } => Some(404),
        _ => None,
    }
}

/// The remote's own message if it sent one, else the error text or `fallback`.
fn remote_detail(e: &RelayError, fallback: &str) -> String {
    match e {
        RelayError::Remote { body, .. } => {
            remote_message(body).unwrap_or_else(|| fallback.to_string())
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_id() {
        let r = extract_file_reference(&json!({ "id": "f1", "name": "minutes.txt" })).unwrap();
        assert_eq!(r.as_str(), "f1");
    }

    #[test]
    fn missing_or_bad_id_is_upload_error() {
        for body in [json!({}), json!({ "id": 42 }), json!({ "id": "" }), json!([])] {
            match extract_file_reference(&body) {
                Err(DocflowError::Upload { message, .. }) => {
                    assert_eq!(message, "missing file identifier")
                }
                other => panic!("expected Upload error for {body}, got {other:?}"),
            }
        }
    }

    #[test]
    fn not_found_message_differs_from_generic() {
        let not_found = workflow_error(RelayError::WorkflowNotFound { body: json!({}) });
        let generic = workflow_error(RelayError::Remote {
            status: 500,
            body: json!({}),
        });
        assert_ne!(not_found.to_string(), generic.to_string());
        assert_eq!(not_found.status(), Some(404));
        assert!(not_found.to_string().contains(WORKFLOW_NOT_FOUND_MESSAGE));
    }

    #[test]
    fn workflow_error_uses_nested_message() {
        let e = workflow_error(RelayError::Remote {
            status: 400,
            body: json!({
                "error": "Workflow execution failed",
                "details": { "code": "invalid_param", "message": "document is required" }
            }),
        });
        assert_eq!(e.status(), Some(400));
        assert!(e.to_string().contains("document is required"), "got {e}");
    }

    #[test]
    fn status_is_the_one_the_remote_sent() {
        let unreadable = upload_error(RelayError::InvalidBody {
            status: 200,
            detail: "expected value at line 1 column 1".into(),
        });
        assert_eq!(unreadable.status(), Some(200));
        assert!(!unreadable.to_string().contains("502"), "got {unreadable}");

        let local = upload_error(RelayError::MalformedRequest {
            detail: "invalid MIME type 'not a mime'".into(),
        });
        assert_eq!(local.status(), None);
        assert!(!local.to_string().contains("HTTP"), "got {local}");

        let rejected = workflow_error(RelayError::Remote {
            status: 429,
            body: json!({ "message": "rate limited" }),
        });
        assert_eq!(rejected.status(), Some(429));
    }

    #[test]
    fn configuration_errors_are_preflight() {
        let e = upload_error(RelayError::NotConfigured {
            setting: "API key",
            env_var: "DIFY_API_KEY",
        });
        assert!(e.is_preflight());
        assert!(e.to_string().contains("DIFY_API_KEY"));
    }
}
