//! Guest document abstraction
//!
//! The agent never assumes anything about guest markup beyond what these
//! queries return. `MemoryDocument` is a small in-process tree used for
//! testing and for hosts that mirror the guest DOM.

use crate::error::GuestAgentFault;
use std::cell::Cell;
use std::collections::BTreeMap;

/// Element classes the agent queries for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Clickable controls (`button`, `[role="button"]`)
    Controls,
    Videos,
    /// Free-text inputs the chat message is typed into
    TextInputs,
    /// Elements that may render third-party chrome text
    ChromeCandidates,
}

/// Tags scanned for deny-listed chrome text
pub const CHROME_TAGS: &[&str] = &[
    "button", "div", "span", "p", "label", "section", "header", "footer", "aside", "h1", "h2",
    "h3", "h4",
];

impl Selector {
    /// CSS form used by the injected script
    pub fn css(&self) -> String {
        match self {
            Selector::Controls => "button, [role=\"button\"]".to_string(),
            Selector::Videos => "video".to_string(),
            Selector::TextInputs => {
                "textarea, input[type=\"text\"], input:not([type])".to_string()
            }
            Selector::ChromeCandidates => CHROME_TAGS.join(", "),
        }
    }
}

/// Read/drive access to the guest document
///
/// Every call may fail: guest markup changes underneath the agent at any
/// time, so a node handed out by one query can be gone by the next call.
pub trait GuestDom {
    type Node: Copy + Eq + std::fmt::Debug;

    /// Whether the document has a body the agent can act on
    fn is_ready(&self) -> bool;

    /// All matching nodes in document order
    fn query_all(&self, selector: Selector) -> Result<Vec<Self::Node>, GuestAgentFault>;

    /// Concatenated text of the node and its descendants
    fn text_content(&self, node: Self::Node) -> Result<String, GuestAgentFault>;

    fn attribute(&self, node: Self::Node, name: &str) -> Result<Option<String>, GuestAgentFault>;

    /// Whether the node is, or has a descendant, `<video>`
    fn contains_video(&self, node: Self::Node) -> Result<bool, GuestAgentFault>;

    fn click(&mut self, node: Self::Node) -> Result<(), GuestAgentFault>;

    /// Hide the node; hiding an already-hidden node is a no-op
    fn hide(&mut self, node: Self::Node) -> Result<(), GuestAgentFault>;

    fn has_stylesheet(&self, id: &str) -> bool;

    fn install_stylesheet(&mut self, id: &str, css: &str) -> Result<(), GuestAgentFault>;

    /// Set an input's value through input/change events rather than a
    /// raw property write, so the guest framework observes it
    fn set_value(&mut self, node: Self::Node, value: &str) -> Result<(), GuestAgentFault>;

    /// Dispatch an Enter key press on the node
    fn press_enter(&mut self, node: Self::Node) -> Result<(), GuestAgentFault>;
}

/// Handle to a node of a `MemoryDocument`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Side effects the agent performed on a `MemoryDocument`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomAction {
    Click(NodeId),
    SetValue(NodeId, String),
    Enter(NodeId),
    Hide(NodeId),
    Stylesheet(String),
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    hidden: bool,
    value: String,
}

/// In-memory guest document
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<Option<Element>>,
    body: NodeId,
    ready: bool,
    stylesheets: BTreeMap<String, String>,
    actions: Vec<DomAction>,
    pending_faults: Cell<usize>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// A loaded document with an empty `<body>`
    pub fn new() -> Self {
        let body = Element {
            tag: "body".to_string(),
            attributes: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
            hidden: false,
            value: String::new(),
        };
        Self {
            nodes: vec![Some(body)],
            body: NodeId(0),
            ready: true,
            stylesheets: BTreeMap::new(),
            actions: Vec::new(),
            pending_faults: Cell::new(0),
        }
    }

    /// A document still parsing; the agent must not act on it yet
    pub fn loading() -> Self {
        let mut doc = Self::new();
        doc.ready = false;
        doc
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Append an element with the given tag and own text
    pub fn append(&mut self, parent: NodeId, tag: &str, text: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Element {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: text.to_string(),
            children: Vec::new(),
            parent: Some(parent),
            hidden: false,
            value: String::new(),
        }));
        if let Some(Some(p)) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    pub fn button(&mut self, parent: NodeId, label: &str) -> NodeId {
        self.append(parent, "button", label)
    }

    /// Append a `<video>`; `local` flags it as the camera self-view
    pub fn video(&mut self, parent: NodeId, local: bool) -> NodeId {
        let id = self.append(parent, "video", "");
        if local {
            self.set_attribute(id, "data-local", "true");
        }
        id
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attributes
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(el) = self.element_mut(node) {
            el.text = text.to_string();
        }
    }

    /// Detach a node and its subtree
    pub fn remove(&mut self, node: NodeId) {
        let Some(el) = self.nodes.get_mut(node.0).and_then(Option::take) else {
            return;
        };
        if let Some(parent) = el.parent.and_then(|p| self.element_mut(p)) {
            parent.children.retain(|c| *c != node);
        }
        for child in el.children {
            self.remove(child);
        }
    }

    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(|el| el.hidden)
    }

    /// Hidden nodes in id order
    pub fn hidden_nodes(&self) -> Vec<NodeId> {
        self.live_nodes()
            .filter(|id| self.is_hidden(*id))
            .collect()
    }

    pub fn value(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.value.as_str())
    }

    pub fn stylesheet(&self, id: &str) -> Option<&str> {
        self.stylesheets.get(id).map(String::as_str)
    }

    /// Number of clicks dispatched on the node
    pub fn clicks(&self, node: NodeId) -> usize {
        self.actions
            .iter()
            .filter(|a| **a == DomAction::Click(node))
            .count()
    }

    pub fn actions(&self) -> &[DomAction] {
        &self.actions
    }

    /// Make the next `n` queries fail, simulating a hostile guest page
    pub fn inject_faults(&mut self, n: usize) {
        self.pending_faults.set(n);
    }

    fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0).and_then(Option::as_ref)
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(node.0).and_then(Option::as_mut)
    }

    fn live(&self, node: NodeId) -> Result<&Element, GuestAgentFault> {
        self.element(node).ok_or(GuestAgentFault::Detached)
    }

    fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| self.element(*id).is_some())
    }

    /// Document order (pre-order from body)
    fn document_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.body];
        while let Some(id) = stack.pop() {
            if let Some(el) = self.element(id) {
                out.push(id);
                stack.extend(el.children.iter().rev().copied());
            }
        }
        out
    }

    fn matches(el: &Element, selector: Selector) -> bool {
        match selector {
            Selector::Controls => {
                el.tag == "button" || el.attributes.get("role").is_some_and(|r| r == "button")
            }
            Selector::Videos => el.tag == "video",
            Selector::TextInputs => {
                el.tag == "textarea"
                    || (el.tag == "input"
                        && el.attributes.get("type").map_or(true, |t| t == "text"))
            }
            Selector::ChromeCandidates => CHROME_TAGS.contains(&el.tag.as_str()),
        }
    }
}

impl GuestDom for MemoryDocument {
    type Node = NodeId;

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn query_all(&self, selector: Selector) -> Result<Vec<NodeId>, GuestAgentFault> {
        let pending = self.pending_faults.get();
        if pending > 0 {
            self.pending_faults.set(pending - 1);
            return Err(GuestAgentFault::Dom("injected query fault".to_string()));
        }
        Ok(self
            .document_order()
            .into_iter()
            .filter(|id| self.element(*id).is_some_and(|el| Self::matches(el, selector)))
            .collect())
    }

    fn text_content(&self, node: NodeId) -> Result<String, GuestAgentFault> {
        let el = self.live(node)?;
        let mut text = el.text.clone();
        for child in &el.children {
            text.push_str(&self.text_content(*child)?);
        }
        Ok(text)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, GuestAgentFault> {
        Ok(self.live(node)?.attributes.get(name).cloned())
    }

    fn contains_video(&self, node: NodeId) -> Result<bool, GuestAgentFault> {
        let el = self.live(node)?;
        if el.tag == "video" {
            return Ok(true);
        }
        for child in &el.children {
            if self.contains_video(*child)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn click(&mut self, node: NodeId) -> Result<(), GuestAgentFault> {
        self.live(node)?;
        self.actions.push(DomAction::Click(node));
        Ok(())
    }

    fn hide(&mut self, node: NodeId) -> Result<(), GuestAgentFault> {
        let el = self.element_mut(node).ok_or(GuestAgentFault::Detached)?;
        if !el.hidden {
            el.hidden = true;
            self.actions.push(DomAction::Hide(node));
        }
        Ok(())
    }

    fn has_stylesheet(&self, id: &str) -> bool {
        self.stylesheets.contains_key(id)
    }

    fn install_stylesheet(&mut self, id: &str, css: &str) -> Result<(), GuestAgentFault> {
        self.stylesheets.insert(id.to_string(), css.to_string());
        self.actions.push(DomAction::Stylesheet(id.to_string()));
        Ok(())
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), GuestAgentFault> {
        let el = self.element_mut(node).ok_or(GuestAgentFault::Detached)?;
        el.value = value.to_string();
        self.actions.push(DomAction::SetValue(node, value.to_string()));
        Ok(())
    }

    fn press_enter(&mut self, node: NodeId) -> Result<(), GuestAgentFault> {
        self.live(node)?;
        self.actions.push(DomAction::Enter(node));
        Ok(())
    }
}
