//! Provisioning client configuration

use crate::error::{ProvisioningError, Result};
use reqwest::Url;
use std::time::Duration;

/// Default base URL of the conversation backend
pub const DEFAULT_BASE_URL: &str = "https://tavusapi.com/v2";

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "CONVERSATION_API_KEY";

/// Environment variable overriding the base URL
pub const BASE_URL_ENV: &str = "CONVERSATION_API_URL";

/// Provisioning client configuration
///
/// Read-only for the lifetime of the process once a client is built.
#[derive(Clone)]
pub struct ProvisioningConfig {
    /// Base URL; endpoints are appended as `/conversations[/{id}]`
    pub base_url: String,

    /// Static API key sent as `x-api-key`
    pub api_key: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for ProvisioningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProvisioningConfig {
    /// Create a config for the default backend
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Load from `CONVERSATION_API_KEY` and optional `CONVERSATION_API_URL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            ProvisioningError::InvalidConfig(format!("{} is not set", API_KEY_ENV))
        })?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            config = config.with_base_url(url);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ProvisioningError::InvalidConfig(
                "API key must not be empty".to_string(),
            ));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ProvisioningError::InvalidConfig(format!(
                "base URL must be http(s): '{}'",
                self.base_url
            )));
        }
        self.endpoint(None).map(|_| ())
    }

    /// `{base}/conversations`
    pub fn conversations_url(&self) -> Result<Url> {
        self.endpoint(None)
    }

    /// `{base}/conversations/{id}`
    ///
    /// The id is always exactly one path segment: `/`, `?` and `%` are
    /// percent-encoded, and ids that would name the collection or its
    /// parent (empty, `.`, `..`) are rejected.
    pub fn conversation_url(&self, id: &str) -> Result<Url> {
        if id.trim().is_empty() || id == "." || id == ".." {
            return Err(ProvisioningError::InvalidConfig(format!(
                "invalid session id '{}'",
                id
            )));
        }
        self.endpoint(Some(id))
    }

    fn endpoint(&self, id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ProvisioningError::InvalidConfig(format!("invalid base URL '{}': {}", self.base_url, e))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProvisioningError::InvalidConfig(format!(
                    "base URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty().push("conversations");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}
