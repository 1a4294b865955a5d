//! Sandbox host, the seam to the rendering framework
//!
//! A sandbox is an isolated web content surface (an embedded browser view)
//! running third-party content. Host and guest share nothing: the host
//! pushes script source in, the guest posts string messages out.

use std::collections::HashSet;
use std::fmt;

/// Identity of one sandbox instance
///
/// A reload produces a new id; events tagged with a discarded id are stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SandboxId(String);

impl SandboxId {
    /// Generate a fresh id (`sbx-<uuid>`)
    pub fn generate() -> Self {
        Self(format!("sbx-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle and message events reported by a sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxEvent {
    /// Navigation to the join URL began
    LoadStarted,
    /// The surface failed to load (network, TLS, bad URL, ...)
    LoadError(String),
    /// A string the guest posted to the host
    Message(String),
}

/// Rendering-framework operations the bridge needs
///
/// Called from the host UI thread only.
pub trait SandboxHost {
    /// Create a new sandbox navigating to `url`, with `preload` injected at
    /// load start, before any guest content renders
    fn create(&mut self, url: &str, preload: &str) -> SandboxId;

    /// Evaluate script in the loaded guest document; no result is returned
    fn inject(&mut self, sandbox: &SandboxId, script: &str);

    /// Destroy the sandbox and everything running inside it
    fn release(&mut self, sandbox: &SandboxId);
}

/// One `create` call recorded by `MemorySandbox`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLoad {
    pub id: SandboxId,
    pub url: String,
    pub preload: String,
}

/// Recording sandbox host for testing and headless use
///
/// Injections into released or unknown sandboxes are dropped, matching a
/// real surface where the target document no longer exists.
#[derive(Debug, Default)]
pub struct MemorySandbox {
    loads: Vec<SandboxLoad>,
    injections: Vec<(SandboxId, String)>,
    released: Vec<SandboxId>,
    live: HashSet<SandboxId>,
}

impl MemorySandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// All loads in creation order
    pub fn loads(&self) -> &[SandboxLoad] {
        &self.loads
    }

    pub fn last_load(&self) -> Option<&SandboxLoad> {
        self.loads.last()
    }

    /// Scripts delivered to live sandboxes
    pub fn injections(&self) -> &[(SandboxId, String)] {
        &self.injections
    }

    pub fn released(&self) -> &[SandboxId] {
        &self.released
    }

    pub fn is_live(&self, id: &SandboxId) -> bool {
        self.live.contains(id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl SandboxHost for MemorySandbox {
    fn create(&mut self, url: &str, preload: &str) -> SandboxId {
        let id = SandboxId::generate();
        self.loads.push(SandboxLoad {
            id: id.clone(),
            url: url.to_string(),
            preload: preload.to_string(),
        });
        self.live.insert(id.clone());
        id
    }

    fn inject(&mut self, sandbox: &SandboxId, script: &str) {
        if !self.live.contains(sandbox) {
            tracing::debug!(sandbox = %sandbox, "Injection into dead sandbox dropped");
            return;
        }
        self.injections.push((sandbox.clone(), script.to_string()));
    }

    fn release(&mut self, sandbox: &SandboxId) {
        if self.live.remove(sandbox) {
            self.released.push(sandbox.clone());
        }
    }
}
