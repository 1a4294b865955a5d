//! Session provisioning against the conversation backend
//!
//! `ConversationApi` is the abstraction the rest of the crate depends on;
//! `ProvisioningClient` is the REST implementation. The client is stateless:
//! no retries, no caching.

mod client;
mod config;

pub use client::ProvisioningClient;
pub use config::{ProvisioningConfig, API_KEY_ENV, BASE_URL_ENV, DEFAULT_BASE_URL};

use crate::error::Result;
use crate::types::{ConversationConfig, ConversationSession};
use async_trait::async_trait;

/// Create, fetch, and terminate remote conversation sessions
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// Provision a new session (`POST /conversations`)
    async fn create_session(&self, config: &ConversationConfig) -> Result<ConversationSession>;

    /// Fetch a session by id (`GET /conversations/{id}`)
    async fn get_session(&self, id: &str) -> Result<ConversationSession>;

    /// Terminate a session (`DELETE /conversations/{id}`)
    ///
    /// Ending an already-ended session is not special-cased; whatever the
    /// backend answers is surfaced.
    async fn end_session(&self, id: &str) -> Result<()>;
}
