//! Guest agent state machine
//!
//! `NotJoined -> Joined -> AvatarReady`. Every scan re-derives its action
//! from the current document; nothing is cached between scans except the
//! two flags, so a guest page that re-renders arbitrarily cannot leave the
//! agent in an inconsistent state.

use super::config::AgentConfig;
use super::dom::{GuestDom, Selector};
use super::script::STYLE_ELEMENT_ID;
use crate::error::GuestAgentFault;
use crate::types::AVATAR_READY_MESSAGE;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Guest-to-host message channel
pub trait MessagePort {
    fn post_message(&mut self, message: &str);
}

impl MessagePort for Vec<String> {
    fn post_message(&mut self, message: &str) {
        self.push(message.to_string());
    }
}

impl MessagePort for mpsc::UnboundedSender<String> {
    fn post_message(&mut self, message: &str) {
        // Receiver gone means the host dropped the view
        let _ = self.send(message.to_string());
    }
}

/// The agent's only state
///
/// `avatar_ready` implies `joined`, and never reverts once set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentState {
    pub joined: bool,
    pub avatar_ready: bool,
}

/// Host-side events delivered to a running agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestEvent {
    /// The guest document changed
    Mutated,
    /// Host-injected `sendText` call
    SendText(String),
}

/// Auto-join, readiness detection, and UI suppression over a guest document
pub struct GuestAgent<D: GuestDom, P: MessagePort> {
    config: AgentConfig,
    stylesheet: String,
    dom: D,
    port: P,
    state: AgentState,
    faults: u64,
}

impl<D: GuestDom, P: MessagePort> GuestAgent<D, P> {
    pub fn new(config: &AgentConfig, dom: D, port: P) -> Self {
        let config = config.normalized();
        let stylesheet = config.stylesheet();
        Self {
            config,
            stylesheet,
            dom,
            port,
            state: AgentState::default(),
            faults: 0,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    /// Faults caught and swallowed so far
    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// Timer-driven scan cycle
    pub fn tick(&mut self) {
        self.scan("tick");
    }

    /// Mutation-driven scan cycle; same work as a tick
    pub fn on_mutation(&mut self) {
        self.scan("mutation");
    }

    fn scan(&mut self, trigger: &'static str) {
        if !self.dom.is_ready() {
            tracing::trace!(trigger, "Guest document not ready");
            return;
        }

        if !self.state.joined {
            let result = self.try_join();
            self.absorb("join", result);
        }
        if self.state.joined && !self.state.avatar_ready {
            let result = self.detect_ready();
            self.absorb("ready", result);
        }
        if self.state.avatar_ready {
            let result = self.suppress_ui().map(|_| ());
            self.absorb("suppress", result);
        }
    }

    /// A fault ends this step only; the next scan starts clean
    fn absorb(&mut self, step: &'static str, result: Result<(), GuestAgentFault>) {
        if let Err(fault) = result {
            self.faults += 1;
            tracing::warn!(step, error = %fault, "Guest agent step failed");
        }
    }

    fn try_join(&mut self) -> Result<(), GuestAgentFault> {
        for control in self.dom.query_all(Selector::Controls)? {
            // A control that vanished mid-scan is skipped, not fatal
            let Ok(label) = self.label(control) else {
                continue;
            };
            if matches_any(&label, &self.config.join_keywords) {
                self.dom.click(control)?;
                self.state.joined = true;
                tracing::info!(label = %label, "Joined conversation");
                return Ok(());
            }
        }
        Ok(())
    }

    fn detect_ready(&mut self) -> Result<(), GuestAgentFault> {
        for video in self.dom.query_all(Selector::Videos)? {
            if !self.is_self_view(video)? {
                self.state.avatar_ready = true;
                self.port.post_message(AVATAR_READY_MESSAGE);
                tracing::info!("Remote media detected, avatar ready");
                return Ok(());
            }
        }
        Ok(())
    }

    /// Install the stylesheet and hide deny-listed chrome
    ///
    /// Idempotent: repeated calls on an unchanged document hide the same
    /// set. Elements containing a video are never hidden. Returns how many
    /// elements currently match the deny-list.
    pub fn suppress_ui(&mut self) -> Result<usize, GuestAgentFault> {
        if !self.dom.has_stylesheet(STYLE_ELEMENT_ID) {
            self.dom.install_stylesheet(STYLE_ELEMENT_ID, &self.stylesheet)?;
            tracing::debug!("Suppression stylesheet installed");
        }

        let mut matched = 0;
        for node in self.dom.query_all(Selector::ChromeCandidates)? {
            let Ok(text) = self.dom.text_content(node) else {
                continue;
            };
            let text = text.trim().to_lowercase();
            if text.is_empty() || !matches_any(&text, &self.config.chrome_deny_list) {
                continue;
            }
            if self.dom.contains_video(node)? {
                continue;
            }
            self.dom.hide(node)?;
            matched += 1;
        }
        if matched > 0 {
            tracing::debug!(count = matched, "Guest chrome hidden");
        }
        Ok(matched)
    }

    /// Deliver a chat message through the guest page's own input
    ///
    /// Returns whether the message was handed to the page. Failures are
    /// logged and reported as `false`, never propagated.
    pub fn send_text(&mut self, text: &str) -> bool {
        match self.try_send_text(text) {
            Ok(delivered) => delivered,
            Err(fault) => {
                self.faults += 1;
                tracing::warn!(error = %fault, "Failed to deliver text to guest");
                false
            }
        }
    }

    fn try_send_text(&mut self, text: &str) -> Result<bool, GuestAgentFault> {
        if text.is_empty() || !self.dom.is_ready() {
            return Ok(false);
        }
        let Some(input) = self.dom.query_all(Selector::TextInputs)?.into_iter().next() else {
            tracing::debug!("No text input in guest document");
            return Ok(false);
        };
        self.dom.set_value(input, text)?;

        for control in self.dom.query_all(Selector::Controls)? {
            let Ok(label) = self.label(control) else {
                continue;
            };
            if matches_any(&label, &self.config.send_keywords) {
                self.dom.click(control)?;
                return Ok(true);
            }
        }
        self.dom.press_enter(input)?;
        Ok(true)
    }

    /// Visible text plus `aria-label`, lowercased
    fn label(&self, node: D::Node) -> Result<String, GuestAgentFault> {
        let text = self.dom.text_content(node)?;
        let aria = self.dom.attribute(node, "aria-label")?.unwrap_or_default();
        Ok(format!("{} {}", text, aria).trim().to_lowercase())
    }

    fn is_self_view(&self, video: D::Node) -> Result<bool, GuestAgentFault> {
        for marker in &self.config.self_view_markers {
            let Some(value) = self.dom.attribute(video, &marker.attribute)? else {
                continue;
            };
            match &marker.contains {
                None => return Ok(true),
                Some(needle) if value.to_lowercase().contains(needle.as_str()) => {
                    return Ok(true)
                }
                Some(_) => {}
            }
        }
        Ok(false)
    }

    /// Drive the agent from a fixed-interval timer and host events
    ///
    /// Runs until the event channel closes, which is how a discarded
    /// sandbox tears its agent down. Returns the agent for inspection.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<GuestEvent>) -> Self {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                event = events.recv() => match event {
                    Some(GuestEvent::Mutated) => self.on_mutation(),
                    Some(GuestEvent::SendText(text)) => {
                        self.send_text(&text);
                    }
                    None => break,
                },
            }
        }

        tracing::debug!(state = ?self.state, "Guest agent stopped");
        self
    }
}

fn matches_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| text.contains(k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::dom::{DomAction, MemoryDocument};

    fn agent(doc: MemoryDocument) -> GuestAgent<MemoryDocument, Vec<String>> {
        GuestAgent::new(&AgentConfig::default(), doc, Vec::new())
    }

    /// Document already past the join step with a local self-view
    fn joined_agent() -> GuestAgent<MemoryDocument, Vec<String>> {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        doc.button(body, "Join call");
        doc.video(body, true);
        let mut agent = agent(doc);
        agent.tick();
        assert!(agent.state().joined);
        agent
    }

    #[test]
    fn test_no_join_control_never_joins() {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        doc.button(body, "Settings");
        doc.append(body, "div", "Welcome");
        let mut agent = agent(doc);

        for _ in 0..50 {
            agent.tick();
            agent.on_mutation();
        }
        assert_eq!(agent.state(), AgentState::default());
        assert_eq!(agent.faults(), 0);
        assert!(agent.port().is_empty());
    }

    #[test]
    fn test_late_join_control_clicked_once() {
        let mut agent = agent(MemoryDocument::new());
        agent.tick();
        assert!(!agent.state().joined);

        let body = agent.dom().body();
        let join = agent.dom_mut().button(body, "I'm READY to start");
        agent.tick();
        assert!(agent.state().joined);

        for _ in 0..20 {
            agent.tick();
            agent.on_mutation();
        }
        assert_eq!(agent.dom().clicks(join), 1);
    }

    #[test]
    fn test_join_matches_aria_label() {
        let mut doc = MemoryDocument::new();
        let icon = doc.append(doc.body(), "div", "");
        doc.set_attribute(icon, "role", "button");
        doc.set_attribute(icon, "aria-label", "Join meeting");
        let mut agent = agent(doc);
        agent.tick();
        assert!(agent.state().joined);
        assert_eq!(agent.dom().clicks(icon), 1);
    }

    #[test]
    fn test_not_ready_document_is_left_alone() {
        let mut doc = MemoryDocument::loading();
        let join = doc.button(doc.body(), "Join");
        let mut agent = agent(doc);
        agent.tick();
        assert!(!agent.state().joined);

        agent.dom_mut().set_ready(true);
        agent.on_mutation();
        assert!(agent.state().joined);
        assert_eq!(agent.dom().clicks(join), 1);
    }

    #[test]
    fn test_self_view_alone_is_not_ready() {
        let mut agent = joined_agent();
        let body = agent.dom().body();
        let other = agent.dom_mut().video(body, false);
        agent.dom_mut().set_attribute(other, "class", "tile LOCAL-preview");
        for _ in 0..10 {
            agent.tick();
        }
        assert!(!agent.state().avatar_ready);
        assert!(agent.port().is_empty());
    }

    #[test]
    fn test_remote_video_signals_ready_once() {
        let mut agent = joined_agent();
        let body = agent.dom().body();
        let remote = agent.dom_mut().video(body, false);
        agent.tick();
        assert!(agent.state().avatar_ready);

        agent.dom_mut().video(body, false);
        agent.dom_mut().remove(remote);
        for _ in 0..10 {
            agent.tick();
            agent.on_mutation();
        }
        assert_eq!(agent.port(), &vec![AVATAR_READY_MESSAGE.to_string()]);
        assert!(agent.state().avatar_ready);
    }

    #[test]
    fn test_ready_requires_join() {
        let mut doc = MemoryDocument::new();
        doc.video(doc.body(), false);
        let mut agent = agent(doc);
        agent.tick();
        assert!(!agent.state().avatar_ready);
    }

    #[test]
    fn test_suppression_only_after_ready() {
        let mut agent = joined_agent();
        let body = agent.dom().body();
        let chrome = agent.dom_mut().append(body, "div", "Waiting for others to join");
        agent.tick();
        assert!(!agent.dom().is_hidden(chrome));
        assert!(agent.dom().stylesheet(STYLE_ELEMENT_ID).is_none());

        agent.dom_mut().video(body, false);
        agent.tick();
        assert!(agent.dom().is_hidden(chrome));
        assert!(agent.dom().stylesheet(STYLE_ELEMENT_ID).is_some());
    }

    #[test]
    fn test_suppression_skips_video_containers() {
        let mut agent = joined_agent();
        let body = agent.dom().body();
        let tile = agent.dom_mut().append(body, "div", "2 participants");
        agent.dom_mut().video(tile, false);
        let counter = agent.dom_mut().append(body, "span", "2 participants");
        agent.tick();

        assert!(agent.state().avatar_ready);
        assert!(!agent.dom().is_hidden(tile));
        assert!(agent.dom().is_hidden(counter));
    }

    #[test]
    fn test_suppression_is_idempotent() {
        let mut agent = joined_agent();
        let body = agent.dom().body();
        agent.dom_mut().video(body, false);
        agent.dom_mut().append(body, "div", "Mute");
        agent.dom_mut().append(body, "p", "Allow access to your camera and microphone");
        agent.dom_mut().append(body, "p", "Hello there");
        agent.tick();

        let once = agent.dom().hidden_nodes();
        for _ in 0..5 {
            assert_eq!(agent.suppress_ui().unwrap(), 2);
        }
        assert_eq!(agent.dom().hidden_nodes(), once);
        assert_eq!(once.len(), 2);
        let stylesheets = agent
            .dom()
            .actions()
            .iter()
            .filter(|a| matches!(a, DomAction::Stylesheet(_)))
            .count();
        assert_eq!(stylesheets, 1);
    }

    #[test]
    fn test_resurrected_chrome_is_hidden_again() {
        let mut agent = joined_agent();
        let body = agent.dom().body();
        agent.dom_mut().video(body, false);
        let bar = agent.dom_mut().append(body, "div", "Leave call");
        agent.tick();
        assert!(agent.dom().is_hidden(bar));

        agent.dom_mut().remove(bar);
        let again = agent.dom_mut().append(body, "div", "Leave call");
        agent.on_mutation();
        assert!(agent.dom().is_hidden(again));
    }

    #[test]
    fn test_fault_does_not_stop_later_scans() {
        let mut doc = MemoryDocument::new();
        let join = doc.button(doc.body(), "Join");
        doc.inject_faults(3);
        let mut agent = agent(doc);

        agent.tick();
        agent.tick();
        agent.tick();
        assert!(!agent.state().joined);
        assert_eq!(agent.faults(), 3);

        agent.tick();
        assert!(agent.state().joined);
        assert_eq!(agent.dom().clicks(join), 1);
    }

    #[test]
    fn test_send_text_clicks_send_control() {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        let input = doc.append(body, "textarea", "");
        let send = doc.button(body, "Send");
        let mut agent = agent(doc);

        assert!(agent.send_text("hello"));
        assert_eq!(agent.dom().value(input), Some("hello"));
        assert_eq!(agent.dom().clicks(send), 1);
        assert!(!agent.dom().actions().contains(&DomAction::Enter(input)));
    }

    #[test]
    fn test_send_text_falls_back_to_enter() {
        let mut doc = MemoryDocument::new();
        let input = doc.append(doc.body(), "input", "");
        let mut agent = agent(doc);

        assert!(agent.send_text("hi"));
        assert_eq!(
            agent.dom().actions(),
            &[
                DomAction::SetValue(input, "hi".to_string()),
                DomAction::Enter(input)
            ]
        );
    }

    #[test]
    fn test_send_text_without_input_is_noop() {
        let mut agent = agent(MemoryDocument::new());
        assert!(!agent.send_text("hi"));
        assert!(agent.dom().actions().is_empty());
    }

    #[test]
    fn test_send_text_fault_is_swallowed() {
        let mut doc = MemoryDocument::new();
        doc.append(doc.body(), "textarea", "");
        doc.inject_faults(1);
        let mut agent = agent(doc);
        assert!(!agent.send_text("hi"));
        assert_eq!(agent.faults(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_and_handles_events() {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        let join = doc.button(body, "Join");
        let input = doc.append(body, "textarea", "");
        let agent = agent(doc);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(agent.run(rx));

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        tx.send(GuestEvent::SendText("hello".into())).unwrap();
        tx.send(GuestEvent::Mutated).unwrap();
        drop(tx);

        let agent = handle.await.unwrap();
        assert!(agent.state().joined);
        assert_eq!(agent.dom().clicks(join), 1);
        assert_eq!(agent.dom().value(input), Some("hello"));
    }
}
