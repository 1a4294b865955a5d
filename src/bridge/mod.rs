//! Embedded bridge controller
//!
//! Owns one sandbox per embedding view and turns sandbox lifecycle events
//! and guest messages into a `BridgeConnectionState`:
//!
//! ```text
//! Loading ──avatar-ready──▶ Connected
//!    │                          │
//!  load error          reload() or
//!    ▼                load started
//! Errored ──reload()──▶ Loading ◀┘
//! ```
//!
//! `Connected` is entered only on the guest's readiness signal, never
//! inferred from elapsed time or the absence of errors.

mod escape;

pub use escape::script_literal;
pub(crate) use escape::harden_literal;

use crate::agent::{send_text_call, AgentScript};
use crate::error::SandboxLoadError;
use crate::sandbox::{SandboxEvent, SandboxHost, SandboxId};
use crate::types::GuestMessage;

/// Connection phase of an embedding view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BridgePhase {
    #[default]
    Loading,
    Connected,
    Errored,
}

/// Host-local connection state, one per mounted view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConnectionState {
    pub phase: BridgePhase,
    pub last_error: Option<SandboxLoadError>,
}

/// What the hosting UI layer draws over the sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    /// Progress indicator over the sandbox
    Progress,
    /// Sandbox replaced by an error message with retry and leave actions
    Error { message: String },
    /// Bare sandbox
    None,
}

/// Callbacks to the embedding view's owner
///
/// All methods default to no-ops.
pub trait BridgeObserver {
    fn on_phase_change(&mut self, _from: BridgePhase, _to: BridgePhase) {}

    fn on_error(&mut self, _error: &SandboxLoadError) {}

    /// Navigate away from the conversation view
    fn on_leave(&mut self) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl BridgeObserver for NoopObserver {}

/// Host-side controller for one embedded conversation
pub struct BridgeController<S: SandboxHost> {
    host: S,
    agent: AgentScript,
    observer: Box<dyn BridgeObserver>,
    join_url: Option<String>,
    sandbox: Option<SandboxId>,
    state: BridgeConnectionState,
    disposed: bool,
}

impl<S: SandboxHost> BridgeController<S> {
    pub fn new(host: S, agent: AgentScript) -> Self {
        Self {
            host,
            agent,
            observer: Box::new(NoopObserver),
            join_url: None,
            sandbox: None,
            state: BridgeConnectionState::default(),
            disposed: false,
        }
    }

    pub fn with_observer(mut self, observer: impl BridgeObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn state(&self) -> &BridgeConnectionState {
        &self.state
    }

    pub fn phase(&self) -> BridgePhase {
        self.state.phase
    }

    pub fn last_error(&self) -> Option<&SandboxLoadError> {
        self.state.last_error.as_ref()
    }

    pub fn join_url(&self) -> Option<&str> {
        self.join_url.as_deref()
    }

    /// Current sandbox instance, if mounted
    pub fn sandbox(&self) -> Option<&SandboxId> {
        self.sandbox.as_ref()
    }

    pub fn host(&self) -> &S {
        &self.host
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Create the sandbox for `join_url` with the agent injected at load start
    ///
    /// Mounting again replaces the current sandbox.
    pub fn mount(&mut self, join_url: &str) {
        if self.disposed {
            tracing::warn!(url = %join_url, "Mount on disposed bridge ignored");
            return;
        }
        self.join_url = Some(join_url.to_string());
        self.load();
    }

    /// Discard the current sandbox and load a fresh one at the same URL
    ///
    /// Valid from any phase; clears `last_error`.
    pub fn reload(&mut self) {
        if self.disposed || self.join_url.is_none() {
            tracing::debug!(disposed = self.disposed, "Reload without a mounted sandbox ignored");
            return;
        }
        self.load();
    }

    fn load(&mut self) {
        let Some(url) = self.join_url.clone() else {
            return;
        };
        if let Some(old) = self.sandbox.take() {
            self.host.release(&old);
        }
        let id = self.host.create(&url, self.agent.source());
        tracing::info!(sandbox = %id, url = %url, "Sandbox loading");
        self.sandbox = Some(id);
        self.state.last_error = None;
        self.set_phase(BridgePhase::Loading);
    }

    /// Dispatch an event from a specific sandbox instance
    ///
    /// Events from instances this controller already discarded are dropped.
    pub fn handle_event(&mut self, sandbox: &SandboxId, event: SandboxEvent) {
        if self.sandbox.as_ref() != Some(sandbox) {
            tracing::debug!(sandbox = %sandbox, ?event, "Event from stale sandbox dropped");
            return;
        }
        match event {
            SandboxEvent::LoadStarted => self.on_load_started(),
            SandboxEvent::LoadError(description) => self.on_load_error(&description),
            SandboxEvent::Message(payload) => self.on_guest_message(&payload),
        }
    }

    /// Handle a string posted by the guest
    ///
    /// Only the readiness signal is recognized; anything else is ignored.
    pub fn on_guest_message(&mut self, payload: &str) {
        if self.disposed {
            return;
        }
        match GuestMessage::parse(payload) {
            GuestMessage::AvatarReady => {
                if self.state.phase == BridgePhase::Loading {
                    tracing::info!(sandbox = ?self.sandbox, "Avatar ready");
                    self.set_phase(BridgePhase::Connected);
                }
            }
            GuestMessage::Unrecognized(other) => {
                tracing::debug!(len = other.len(), "Unrecognized guest message ignored");
            }
        }
    }

    /// The current sandbox began a (re)navigation
    ///
    /// An in-place reload gives the guest a fresh agent that has not joined
    /// yet, so the bridge falls back to Loading until it reports ready again.
    pub fn on_load_started(&mut self) {
        if self.disposed {
            return;
        }
        tracing::debug!(sandbox = ?self.sandbox, "Sandbox load started");
        self.state.last_error = None;
        self.set_phase(BridgePhase::Loading);
    }

    /// The sandbox failed to load
    pub fn on_load_error(&mut self, description: &str) {
        if self.disposed {
            return;
        }
        let error = SandboxLoadError::from_description(description);
        tracing::warn!(sandbox = ?self.sandbox, error = %error.diagnostic, "Sandbox load failed");
        self.observer.on_error(&error);
        self.state.last_error = Some(error);
        self.set_phase(BridgePhase::Errored);
    }

    /// Forward a chat message into the live session
    ///
    /// Fire-and-forget; blank text is a no-op. Returns whether a call was
    /// injected. Not gated on phase: before the agent is ready the call
    /// fails silently inside the sandbox.
    pub fn send_text(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let Some(sandbox) = self.sandbox.as_ref() else {
            tracing::debug!("send_text without a sandbox ignored");
            return false;
        };
        self.host.inject(sandbox, &send_text_call(text));
        true
    }

    /// Leave the conversation: notify the owner, then release the sandbox
    pub fn leave(&mut self) {
        if self.disposed {
            return;
        }
        self.observer.on_leave();
        self.dispose();
    }

    /// Release the sandbox; safe to call repeatedly and from any phase
    pub fn dispose(&mut self) {
        if let Some(sandbox) = self.sandbox.take() {
            self.host.release(&sandbox);
            tracing::info!(sandbox = %sandbox, "Sandbox released");
        }
        self.disposed = true;
    }

    /// Rendering contract for the hosting UI layer
    pub fn overlay(&self) -> Overlay {
        match self.state.phase {
            _ if self.disposed => Overlay::None,
            BridgePhase::Loading => Overlay::Progress,
            BridgePhase::Errored => Overlay::Error {
                message: self
                    .state
                    .last_error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Failed to load conversation".to_string()),
            },
            BridgePhase::Connected => Overlay::None,
        }
    }

    fn set_phase(&mut self, to: BridgePhase) {
        let from = self.state.phase;
        self.state.phase = to;
        if from != to {
            self.observer.on_phase_change(from, to);
        }
    }
}

impl<S: SandboxHost> Drop for BridgeController<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
