//! # a3s-conversation
//!
//! Embedded conversation bridge for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-conversation` embeds a third-party real-time video conversation
//! (an AI avatar call) inside a host application. It provisions a session
//! over a REST API, loads the session's join URL in an isolated sandbox,
//! injects an agent that joins the call and hides third-party chrome, and
//! reports when the remote avatar's media is live.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use a3s_conversation::{
//!     AgentConfig, AgentScript, BridgeController, ConversationConfig, ConversationView,
//!     MemorySandbox, ProvisioningClient, ProvisioningConfig,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let api = ProvisioningClient::new(ProvisioningConfig::from_env()?)?;
//! let agent = AgentScript::render(&AgentConfig::default())?;
//!
//! let mut view = ConversationView::new(BridgeController::new(MemorySandbox::new(), agent));
//! view.launch(&api, &ConversationConfig::new("r79e1c033f")).await;
//!
//! println!("Overlay: {:?}", view.overlay());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **ConversationApi** trait: session provisioning, with the REST
//!   `ProvisioningClient` as the production backend
//! - **SandboxHost** trait: the rendering framework's isolated web surface
//! - **BridgeController**: per-view state machine (Loading, Connected, Errored)
//! - **GuestAgent** / **AgentScript**: the injected guest-side agent, as a
//!   testable state machine and as rendered script source
//! - **ConversationView**: provisioning plus embedding, discarding late results

pub mod agent;
pub mod bridge;
pub mod error;
pub mod provisioning;
pub mod sandbox;
pub mod types;
pub mod view;

// Re-export core types
pub use agent::{AgentConfig, AgentScript, GuestAgent, GuestDom, MemoryDocument, SelfViewMarker};
pub use bridge::{
    script_literal, BridgeConnectionState, BridgeController, BridgeObserver, BridgePhase,
    NoopObserver, Overlay,
};
pub use error::{ConfigError, GuestAgentFault, ProvisioningError, Result, SandboxLoadError};
pub use provisioning::{ConversationApi, ProvisioningClient, ProvisioningConfig};
pub use sandbox::{MemorySandbox, SandboxEvent, SandboxHost, SandboxId};
pub use types::{
    ConversationConfig, ConversationProperties, ConversationSession, GuestMessage, SessionStatus,
    AVATAR_READY_MESSAGE,
};
pub use view::{ConversationView, ProvisionTicket};
