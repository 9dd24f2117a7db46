//! Progress-callback trait for submission phase events.
//!
//! Inject an [`Arc<dyn SubmissionProgressCallback>`] via
//! [`crate::config::DocflowConfigBuilder::progress_callback`] to follow a
//! submission through `Uploading → Invoking → Done | Failed`.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docflow::{DocflowConfig, SubmissionPhase, SubmissionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PhaseCounter {
//!     transitions: AtomicUsize,
//! }
//!
//! impl SubmissionProgressCallback for PhaseCounter {
//!     fn on_phase(&self, phase: SubmissionPhase) {
//!         self.transitions.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("now {phase}");
//!     }
//! }
//!
//! let counter = Arc::new(PhaseCounter { transitions: AtomicUsize::new(0) });
//!
//! let config = DocflowConfig::builder()
//!     .progress_callback(counter as Arc<dyn SubmissionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Where a submission currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    /// Nothing submitted yet.
    #[default]
    Idle,
    /// Sending the file to the remote store.
    Uploading,
    /// Waiting on the workflow engine.
    Invoking,
    /// Result available.
    Done,
    /// The attempt ended with an error; the user must resubmit.
    Failed,
}

impl SubmissionPhase {
    /// True once the attempt can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionPhase::Done | SubmissionPhase::Failed)
    }
}

impl fmt::Display for SubmissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionPhase::Idle => "idle",
            SubmissionPhase::Uploading => "uploading",
            SubmissionPhase::Invoking => "invoking",
            SubmissionPhase::Done => "done",
            SubmissionPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Called by the orchestrator as a submission moves through its phases.
///
/// Implementations must be `Send + Sync`: independent submissions on one
/// orchestrator may run concurrently. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait SubmissionProgressCallback: Send + Sync {
    /// Called on every phase transition, including the terminal one.
    fn on_phase(&self, phase: SubmissionPhase) {
        let _ = phase;
    }

    /// Called once the file store has returned a file identifier.
    ///
    /// # Arguments
    /// * `filename` — name of the uploaded file
    /// * `file_id`  — identifier returned by the store
    fn on_upload_complete(&self, filename: &str, file_id: &str) {
        let _ = (filename, file_id);
    }

    /// Called when the workflow result has been normalised.
    ///
    /// # Arguments
    /// * `text_len` — byte length of the display text
    fn on_submission_complete(&self, text_len: usize) {
        let _ = text_len;
    }

    /// Called when the submission fails, with the user-visible message.
    fn on_submission_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SubmissionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DocflowConfig`].
pub type ProgressCallback = Arc<dyn SubmissionProgressCallback>;
