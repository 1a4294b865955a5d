//! Guest-side agent
//!
//! Runs once per sandbox load, inside the untrusted guest page. It
//! auto-joins the call, reports exactly once when remote media is live,
//! and then keeps third-party chrome hidden while the page re-renders.
//!
//! Two forms share one `AgentConfig`:
//!
//! - [`GuestAgent`]: the state machine over a [`GuestDom`], for hosts that
//!   drive the guest document directly and for testing
//! - [`AgentScript`]: the rendered JavaScript injected into a web view

mod config;
mod dom;
mod machine;
mod script;

pub use config::{AgentConfig, SelfViewMarker};
pub use dom::{DomAction, GuestDom, MemoryDocument, NodeId, Selector, CHROME_TAGS};
pub use machine::{AgentState, GuestAgent, GuestEvent, MessagePort};
pub use script::{send_text_call, AgentScript, AGENT_GLOBAL, STYLE_ELEMENT_ID};
