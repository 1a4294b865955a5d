//! Error types for a3s-conversation

use thiserror::Error;

/// Errors returned by the session provisioning API
///
/// Never retried by the client itself; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The backend rejected the API key (HTTP 401)
    #[error("Invalid API credential")]
    InvalidCredential,

    /// Any other non-2xx response
    #[error("Backend returned HTTP {status}: {message}")]
    Backend {
        status: u16,
        message: String,
    },

    /// Connection, TLS, or timeout failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// A 2xx response whose body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Request rejected locally before any network I/O
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProvisioningError {
    /// HTTP status of the failed call, when the backend answered
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::InvalidCredential => Some(401),
            Self::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProvisioningError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProvisioningError::Decode(e.to_string())
        } else {
            ProvisioningError::Transport(e.to_string())
        }
    }
}

/// The sandbox failed to load the join URL
///
/// `message` is shown to the user; `diagnostic` is the raw description
/// reported by the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SandboxLoadError {
    pub message: String,
    pub diagnostic: String,
}

impl SandboxLoadError {
    /// Build from the raw failure description reported by the sandbox
    pub fn from_description(description: impl Into<String>) -> Self {
        let diagnostic = description.into();
        Self {
            message: format!("Failed to load conversation: {}", diagnostic),
            diagnostic,
        }
    }
}

/// A fault raised while the guest agent reads or drives the guest document
///
/// Always caught inside the agent's scan cycle and logged; never crosses
/// the sandbox boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuestAgentFault {
    /// Node was removed from the document between query and use
    #[error("Node detached from document")]
    Detached,

    /// Any other DOM operation failure
    #[error("DOM error: {0}")]
    Dom(String),
}

/// Agent vocabulary / configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse agent config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid agent config: {0}")]
    Invalid(String),

    #[error("Failed to render agent script: {0}")]
    Template(String),
}

impl From<minijinja::Error> for ConfigError {
    fn from(e: minijinja::Error) -> Self {
        ConfigError::Template(e.to_string())
    }
}

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisioningError>;
