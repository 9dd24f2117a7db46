//! Configuration for the relays and the orchestrator.
//!
//! Everything a deployment can vary lives in [`DocflowConfig`], built via its
//! [`DocflowConfigBuilder`]. The two settings the remote API needs (base URL
//! and API key) are deliberately `Option`s: a missing one is not a build
//! error but a *configuration* error raised by the relay on first use, before
//! any network call. That keeps "misconfigured deployment" distinguishable
//! from "remote service rejected the request".

use crate::error::{DocflowError, RelayError};
use crate::progress::ProgressCallback;
use std::collections::BTreeMap;
use std::fmt;

/// Environment variable holding the remote API base URL (e.g. `https://api.dify.ai/v1`).
pub const ENV_API_URL: &str = "DIFY_API_URL";
/// Environment variable holding the remote API key.
pub const ENV_API_KEY: &str = "DIFY_API_KEY";
/// Environment variable overriding the workflow's document input name.
pub const ENV_DOCUMENT_INPUT: &str = "DOCFLOW_DOCUMENT_INPUT";
/// Environment variable overriding the user-token prefix.
pub const ENV_USER_PREFIX: &str = "DOCFLOW_USER_PREFIX";

/// Configuration shared by the relays, the relay server and the orchestrator.
///
/// # Example
/// ```rust
/// use edgequake_docflow::DocflowConfig;
///
/// let config = DocflowConfig::builder()
///     .api_base_url("https://api.dify.ai/v1")
///     .api_key("app-xxxxxxxx")
///     .document_input("minutes")
///     .build()
///     .unwrap();
/// assert!(config.credentials().is_ok());
/// ```
#[derive(Clone)]
pub struct DocflowConfig {
    /// Remote API base URL, without the endpoint path. Required at call time.
    pub api_base_url: Option<String>,

    /// Bearer credential for the remote API. Required at call time.
    pub api_key: Option<String>,

    /// Name of the workflow input that receives the uploaded document.
    /// Default: `document`.
    pub document_input: String,

    /// Prefix of the per-request user token. Default: `docflow`.
    pub user_prefix: String,

    /// Extra text inputs sent with every invocation (e.g. `format=markdown`).
    /// They never override the document slot, `purpose` or `execution_option`.
    pub extra_inputs: BTreeMap<String, String>,

    /// Request body limit for the relay server's upload route. Default: 15 MiB.
    pub max_upload_bytes: usize,

    /// Optional observer for submission phases.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DocflowConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_key: None,
            document_input: "document".to_string(),
            user_prefix: "docflow".to_string(),
            extra_inputs: BTreeMap::new(),
            max_upload_bytes: 15 * 1024 * 1024,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DocflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocflowConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("document_input", &self.document_input)
            .field("user_prefix", &self.user_prefix)
            .field("extra_inputs", &self.extra_inputs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn SubmissionProgressCallback>"),
            )
            .finish()
    }
}

/// Base URL and key, both known to be present.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub base_url: &'a str,
    pub api_key: &'a str,
}

impl Credentials<'_> {
    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl DocflowConfig {
    /// Create a new builder for `DocflowConfig`.
    pub fn builder() -> DocflowConfigBuilder {
        DocflowConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the deployment settings from the process environment.
    ///
    /// Unset variables leave the defaults in place; a missing URL or key is
    /// reported later by [`DocflowConfig::credentials`].
    pub fn from_env() -> Result<Self, DocflowError> {
        let mut builder = Self::builder();
        if let Some(url) = env_non_empty(ENV_API_URL) {
            builder = builder.api_base_url(url);
        }
        if let Some(key) = env_non_empty(ENV_API_KEY) {
            builder = builder.api_key(key);
        }
        if let Some(slot) = env_non_empty(ENV_DOCUMENT_INPUT) {
            builder = builder.document_input(slot);
        }
        if let Some(prefix) = env_non_empty(ENV_USER_PREFIX) {
            builder = builder.user_prefix(prefix);
        }
        builder.build()
    }

    /// Check both remote settings are present, base URL first.
    ///
    /// Blank values count as unset.
    pub fn credentials(&self) -> Result<Credentials<'_>, RelayError> {
        let base_url = non_blank(self.api_base_url.as_deref()).ok_or(RelayError::NotConfigured {
            setting: "API base URL",
            env_var: ENV_API_URL,
        })?;
        let api_key = non_blank(self.api_key.as_deref()).ok_or(RelayError::NotConfigured {
            setting: "API key",
            env_var: ENV_API_KEY,
        })?;
        Ok(Credentials { base_url, api_key })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for [`DocflowConfig`].
#[derive(Debug)]
pub struct DocflowConfigBuilder {
    config: DocflowConfig,
}

impl DocflowConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn document_input(mut self, name: impl Into<String>) -> Self {
        self.config.document_input = name.into();
        self
    }

    pub fn user_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.user_prefix = prefix.into();
        self
    }

    pub fn extra_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.extra_inputs.insert(name.into(), value.into());
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes.max(1024);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DocflowConfig, DocflowError> {
        let c = &self.config;
        if c.document_input.trim().is_empty() {
            return Err(DocflowError::InvalidConfig(
                "document input name must not be empty".into(),
            ));
        }
        if c.user_prefix.trim().is_empty() {
            return Err(DocflowError::InvalidConfig(
                "user prefix must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DocflowConfig::default();
        assert_eq!(config.document_input, "document");
        assert_eq!(config.user_prefix, "docflow");
        assert_eq!(config.max_upload_bytes, 15 * 1024 * 1024);
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn missing_base_url_reported_first() {
        let config = DocflowConfig::default();
        match config.credentials() {
            Err(RelayError::NotConfigured { env_var, .. }) => assert_eq!(env_var, ENV_API_URL),
            other => panic!("expected NotConfigured, got {other:?}"),
        }
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = DocflowConfig::builder()
            .api_base_url("https://api.dify.ai/v1")
            .api_key("   ")
            .build()
            .unwrap();
        match config.credentials() {
            Err(RelayError::NotConfigured { env_var, .. }) => assert_eq!(env_var, ENV_API_KEY),
            other => panic!("expected NotConfigured, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = DocflowConfig::builder()
            .api_base_url("https://api.dify.ai/v1/")
            .api_key("k")
            .build()
            .unwrap();
        let creds = config.credentials().unwrap();
        assert_eq!(creds.endpoint("/files/upload"), "https://api.dify.ai/v1/files/upload");
        assert_eq!(creds.endpoint("workflows/run"), "https://api.dify.ai/v1/workflows/run");
    }

    #[test]
    fn debug_redacts_key() {
        let config = DocflowConfig::builder().api_key("app-secret").build().unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("app-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn empty_document_input_rejected() {
        assert!(DocflowConfig::builder().document_input(" ").build().is_err());
    }
}
