//! Conversation view: provisioning plus embedding for one screen
//!
//! Provisioning is the only step that waits on the network. Its result may
//! arrive after the view has been torn down or after a newer attempt has
//! started; such results are discarded, never applied.

use crate::bridge::{BridgeController, Overlay};
use crate::error::{ProvisioningError, Result};
use crate::provisioning::ConversationApi;
use crate::sandbox::SandboxHost;
use crate::types::{ConversationConfig, ConversationSession};

/// Identifies one provisioning attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionTicket(u64);

/// One conversation screen: provisions a session, then mounts the bridge
pub struct ConversationView<S: SandboxHost> {
    bridge: BridgeController<S>,
    session: Option<ConversationSession>,
    /// Ids of sessions replaced by a later provisioning; still live on the backend
    superseded: Vec<String>,
    provisioning_error: Option<ProvisioningError>,
    attempts: u64,
    pending: Option<u64>,
}

impl<S: SandboxHost> ConversationView<S> {
    pub fn new(bridge: BridgeController<S>) -> Self {
        Self {
            bridge,
            session: None,
            superseded: Vec::new(),
            provisioning_error: None,
            attempts: 0,
            pending: None,
        }
    }

    pub fn bridge(&self) -> &BridgeController<S> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut BridgeController<S> {
        &mut self.bridge
    }

    pub fn session(&self) -> Option<&ConversationSession> {
        self.session.as_ref()
    }

    /// Sessions replaced by a later provisioning and not yet ended
    pub fn superseded(&self) -> &[String] {
        &self.superseded
    }

    pub fn provisioning_error(&self) -> Option<&ProvisioningError> {
        self.provisioning_error.as_ref()
    }

    pub fn is_provisioning(&self) -> bool {
        self.pending.is_some()
    }

    /// Start a provisioning attempt; any earlier attempt becomes stale
    pub fn begin(&mut self) -> ProvisionTicket {
        self.attempts += 1;
        self.pending = Some(self.attempts);
        self.provisioning_error = None;
        ProvisionTicket(self.attempts)
    }

    /// Apply a provisioning result
    ///
    /// Returns false (and drops the result) when the ticket is stale or the
    /// view is already disposed.
    pub fn complete(
        &mut self,
        ticket: ProvisionTicket,
        result: Result<ConversationSession>,
    ) -> bool {
        if self.bridge.is_disposed() || self.pending != Some(ticket.0) {
            tracing::debug!(
                attempt = ticket.0,
                disposed = self.bridge.is_disposed(),
                "Stale provisioning result discarded"
            );
            return false;
        }
        self.pending = None;

        match result {
            Ok(session) => {
                tracing::info!(session_id = %session.id, "Mounting conversation");
                self.bridge.mount(&session.join_url);
                if let Some(old) = self.session.replace(session) {
                    tracing::warn!(session_id = %old.id, "Session superseded by a new provisioning");
                    self.superseded.push(old.id);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Provisioning failed");
                self.provisioning_error = Some(e);
            }
        }
        true
    }

    /// Provision a session and mount it
    ///
    /// Dropping the returned future abandons the attempt.
    pub async fn launch(
        &mut self,
        api: &dyn ConversationApi,
        config: &ConversationConfig,
    ) -> bool {
        let ticket = self.begin();
        let result = api.create_session(config).await;
        self.complete(ticket, result)
    }

    /// End the provisioned session and any superseded ones on the backend
    ///
    /// Superseded sessions that fail to end are kept for the next call; the
    /// first failure is returned.
    pub async fn end_session(&mut self, api: &dyn ConversationApi) -> Result<()> {
        let mut first_error = None;
        for id in std::mem::take(&mut self.superseded) {
            if let Err(e) = api.end_session(&id).await {
                tracing::warn!(session_id = %id, error = %e, "Failed to end superseded session");
                first_error.get_or_insert(e);
                self.superseded.push(id);
            }
        }
        if let Some(session) = &self.session {
            api.end_session(&session.id).await?;
        }
        first_error.map_or(Ok(()), Err)
    }

    /// What to draw: provisioning progress/failure, then the bridge's overlay
    pub fn overlay(&self) -> Overlay {
        if let Some(e) = &self.provisioning_error {
            return Overlay::Error {
                message: e.to_string(),
            };
        }
        if self.pending.is_some() {
            return Overlay::Progress;
        }
        self.bridge.overlay()
    }

    /// Retry after a failure
    ///
    /// Reloads the sandbox when a session exists. Returns false when the
    /// caller must provision again instead, or when the view is disposed.
    pub fn retry(&mut self) -> bool {
        if self.bridge.is_disposed() {
            return false;
        }
        if self.session.is_some() {
            self.bridge.reload();
            true
        } else {
            false
        }
    }

    pub fn leave(&mut self) {
        self.pending = None;
        self.bridge.leave();
    }

    pub fn dispose(&mut self) {
        self.pending = None;
        self.bridge.dispose();
    }
}
