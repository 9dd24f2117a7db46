//! The workflow request body and the identifiers that go into it.
//!
//! Wire shape (Dify `POST /workflows/run`):
//!
//! ```json
//! {
//!   "inputs": {
//!     "document": {"transfer_method": "local_file", "upload_file_id": "f1", "type": "document"},
//!     "purpose": "summary",
//!     "execution_option": "summary"
//!   },
//!   "response_mode": "blocking",
//!   "user": "docflow-1739871234567-3f9a1c2e"
//! }
//! ```

use crate::intent::ProcessingIntent;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Input key carrying the intent's value.
pub const PURPOSE_INPUT: &str = "purpose";
/// Input key carrying the intent's execution option.
pub const EXECUTION_OPTION_INPUT: &str = "execution_option";
/// `user` used by the relay server when a request omits it.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Opaque identifier of a stored file.
///
/// Not `Clone`: building an invocation moves it, so one upload feeds exactly
/// one workflow call.
#[derive(Debug, PartialEq, Eq)]
pub struct FileReference(String);

impl FileReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the engine should deliver the result. Only blocking is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    #[default]
    Blocking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMethod {
    #[default]
    LocalFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    #[default]
    Document,
}

/// A file-typed workflow input pointing at an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInput {
    pub transfer_method: TransferMethod,
    pub upload_file_id: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
}

/// One named workflow input.
///
/// `Other` keeps whatever a relay client sent that is neither a file input
/// nor a string, so the relay server passes it through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    File(FileInput),
    Text(String),
    Other(Value),
}

/// The full `/workflows/run` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInvocation {
    pub inputs: BTreeMap<String, InputValue>,
    #[serde(default)]
    pub response_mode: ResponseMode,
    #[serde(default = "anonymous_user")]
    pub user: String,
}

fn anonymous_user() -> String {
    ANONYMOUS_USER.to_string()
}

impl WorkflowInvocation {
    /// Start an invocation for `file` processed with `intent`.
    pub fn builder(file: FileReference, intent: &ProcessingIntent) -> WorkflowInvocationBuilder {
        WorkflowInvocationBuilder {
            file,
            purpose: intent.value.clone(),
            execution_option: intent.execution_option.clone(),
            document_input: "document".to_string(),
            user: None,
            extra: BTreeMap::new(),
        }
    }

    /// The `upload_file_id` of the first file-typed input.
    pub fn file_id(&self) -> Option<&str> {
        self.inputs.values().find_map(|v| match v {
            InputValue::File(f) => Some(f.upload_file_id.as_str()),
            _ => None,
        })
    }

    /// A text input by name.
    pub fn text_input(&self, name: &str) -> Option<&str> {
        match self.inputs.get(name) {
            Some(InputValue::Text(s)) => Some(s),
            _ => None,
        }
    }
}

/// Builder for [`WorkflowInvocation`].
#[derive(Debug)]
pub struct WorkflowInvocationBuilder {
    file: FileReference,
    purpose: String,
    execution_option: String,
    document_input: String,
    user: Option<String>,
    extra: BTreeMap<String, String>,
}

impl WorkflowInvocationBuilder {
    /// Name of the file-typed input slot. Default: `document`.
    pub fn document_input(mut self, name: impl Into<String>) -> Self {
        self.document_input = name.into();
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Add a named text input. Reserved keys are overwritten at build time.
    pub fn text_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    pub fn text_inputs<'a>(mut self, inputs: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        self.extra
            .extend(inputs.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn build(self) -> WorkflowInvocation {
        let mut inputs: BTreeMap<String, InputValue> = self
            .extra
            .into_iter()
            .map(|(k, v)| (k, InputValue::Text(v)))
            .collect();

        // Reserved keys go in last so extras can never shadow them.
        inputs.insert(PURPOSE_INPUT.to_string(), InputValue::Text(self.purpose));
        inputs.insert(
            EXECUTION_OPTION_INPUT.to_string(),
            InputValue::Text(self.execution_option),
        );
        inputs.insert(
            self.document_input,
            InputValue::File(FileInput {
                transfer_method: TransferMethod::LocalFile,
                upload_file_id: self.file.0,
                kind: FileKind::Document,
            }),
        );

        WorkflowInvocation {
            inputs,
            response_mode: ResponseMode::Blocking,
            user: self.user.unwrap_or_else(anonymous_user),
        }
    }
}

/// Generate a per-request user token: `<prefix>-<unix millis>-<8 hex chars>`.
///
/// The engine only uses it for session attribution, so best-effort
/// uniqueness is enough.
pub fn generate_user_token(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), &suffix[..8])
}
