//! Client configuration.
//!
//! The backend renders a JSON blob into every page (API base, auth token,
//! tuning). It is parsed once into a [`ClientConfig`] and passed explicitly to
//! whatever needs it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid client configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("`{0}` cannot be used as an API base URL")]
    NotABase(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(alias = "apiBase")]
    pub api_base: Url,

    /// Sent as `Authorization: Token <token>`.
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub poll: PollSettings,

    #[serde(default = "default_upload_chunk_size", alias = "uploadChunkSize")]
    pub upload_chunk_size: usize,
}

/// Defaults for readiness polling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub max_attempts: Option<usize>,
    pub deadline_ms: Option<u64>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            max_attempts: Some(50),
            deadline_ms: None,
        }
    }
}

fn default_upload_chunk_size() -> usize {
    DEFAULT_UPLOAD_CHUNK_SIZE
}

impl ClientConfig {
    pub fn new(api_base: Url) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: normalize_base(api_base)?,
            token: None,
            poll: PollSettings::default(),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Parse the page context blob. Unknown keys are ignored.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let mut config: ClientConfig = serde_json::from_str(raw)?;
        config.api_base = normalize_base(config.api_base)?;
        Ok(config)
    }

    /// Resolve `path` against the API base.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.api_base.join(path.trim_start_matches('/'))
    }
}

fn normalize_base(mut base: Url) -> Result<Url, ConfigError> {
    if base.cannot_be_a_base() {
        return Err(ConfigError::NotABase(base.to_string()));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}
