//! # edgequake-docflow
//!
//! Upload a document, run a Dify workflow on it, and get the generated text
//! back.
//!
//! ## Why this crate?
//!
//! A Dify workflow that reads a document needs two calls: the file goes to
//! the file store first, and the returned id is then passed to the workflow
//! as a file-typed input. The response shape also differs between engine
//! versions. This crate owns that two-step protocol and the result decoding,
//! so a CLI, a server or a UI only has to hand over a file and an intent.
//!
//! ## Flow
//!
//! ```text
//! file + intent
//!  │
//!  ├─ 1. Validate   a file must be present (no I/O)
//!  ├─ 2. Upload     POST /files/upload (multipart)        → {"id": …}
//!  ├─ 3. Invoke     POST /workflows/run (blocking, JSON)  → raw JSON
//!  └─ 4. Normalise  answer | data.outputs.text | pretty JSON
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docflow::{DocflowConfig, IntentMenu, Orchestrator, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads DIFY_API_URL / DIFY_API_KEY
//!     let config = DocflowConfig::from_env()?;
//!     let orchestrator = Orchestrator::from_config(config);
//!
//!     let menu = IntentMenu::default();
//!     let file = UploadedFile::from_path("minutes.txt").await?;
//!     let result = orchestrator.submit(Some(file), menu.select("summary")?).await?;
//!     println!("{}", result.display_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `docflow` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Enables [`server`], an axum relay exposing both boundaries over HTTP |
//!
//! Disable both when using only the library:
//! ```toml
//! edgequake-docflow = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod file;
pub mod intent;
pub mod invocation;
pub mod orchestrator;
pub mod progress;
pub mod relay;
pub mod result;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DocflowConfig, DocflowConfigBuilder};
pub use error::{DocflowError, RelayError};
pub use file::UploadedFile;
pub use intent::{IntentMenu, ProcessingIntent};
pub use invocation::{FileReference, WorkflowInvocation};
pub use orchestrator::{DisplayState, Orchestrator};
pub use progress::{
    NoopProgressCallback, ProgressCallback, SubmissionPhase, SubmissionProgressCallback,
};
pub use relay::client::RelayClient;
pub use relay::upload::DifyUploadRelay;
pub use relay::workflow::DifyWorkflowRelay;
pub use relay::{UploadRelay, WorkflowRelay};
pub use result::{ResultShape, WorkflowResult};
