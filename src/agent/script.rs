//! JavaScript delivery form of the guest agent
//!
//! The script is rendered from the same `AgentConfig` the Rust state
//! machine uses, so vocabulary, selectors, and stylesheet never diverge.

use super::config::AgentConfig;
use super::dom::Selector;
use crate::error::ConfigError;
use crate::types::AVATAR_READY_MESSAGE;
use minijinja::{context, Environment};
use serde::Serialize;

/// Global the agent installs its entry points under
pub const AGENT_GLOBAL: &str = "__a3sConversationAgent";

/// Id of the `<style>` element the agent installs
pub const STYLE_ELEMENT_ID: &str = "a3s-conversation-style";

static TEMPLATE: &str = include_str!("guest_agent.js");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Selectors {
    controls: String,
    videos: String,
    text_inputs: String,
    chrome: String,
}

/// Rendered guest agent, injected at sandbox load start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentScript {
    source: String,
}

impl AgentScript {
    /// Render the agent for the given vocabulary
    pub fn render(config: &AgentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = config.normalized();

        let selectors = Selectors {
            controls: Selector::Controls.css(),
            videos: Selector::Videos.css(),
            text_inputs: Selector::TextInputs.css(),
            chrome: Selector::ChromeCandidates.css(),
        };

        // Template name has no extension, so minijinja applies no
        // auto-escaping; every value is already a JSON literal.
        let mut env = Environment::new();
        env.add_template("guest_agent", TEMPLATE)?;
        let source = env.get_template("guest_agent")?.render(context! {
            agent_global => js(&AGENT_GLOBAL)?,
            ready_message => js(&AVATAR_READY_MESSAGE)?,
            poll_ms => config.poll_interval.as_millis() as u64,
            join_keywords => js(&config.join_keywords)?,
            send_keywords => js(&config.send_keywords)?,
            deny_list => js(&config.chrome_deny_list)?,
            self_view_markers => js(&config.self_view_markers)?,
            style_id => js(&STYLE_ELEMENT_ID)?,
            stylesheet => js(&config.stylesheet())?,
            selectors => js(&selectors)?,
        })?;

        tracing::debug!(bytes = source.len(), "Guest agent script rendered");
        Ok(Self { source })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Injected call into the running agent's `sendText` entry point
///
/// Fire-and-forget: if the agent is not installed yet the call does nothing.
pub fn send_text_call(text: &str) -> String {
    format!(
        "(function(){{try{{var a=window[{global}];if(a&&typeof a.sendText==='function'){{a.sendText({text});}}}}catch(e){{}}}})();true;",
        global = crate::bridge::script_literal(AGENT_GLOBAL),
        text = crate::bridge::script_literal(text),
    )
}

fn js<T: Serialize + ?Sized>(value: &T) -> Result<String, ConfigError> {
    let json = serde_json::to_string(value)
        .map_err(|e| ConfigError::Template(format!("failed to encode value: {}", e)))?;
    Ok(crate::bridge::harden_literal(json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let script = AgentScript::render(&AgentConfig::default()).unwrap();
        let src = script.source();
        assert!(!src.contains("{{"));
        assert!(src.contains(&format!("var GLOBAL = \"{}\";", AGENT_GLOBAL)));
        assert!(src.contains(&format!("var READY_MESSAGE = \"{}\";", AVATAR_READY_MESSAGE)));
        assert!(src.contains("var POLL_MS = 500;"));
        assert!(src.contains("MutationObserver"));
        assert!(src.trim_end().ends_with("true;"));
    }

    #[test]
    fn test_render_uses_normalized_vocabulary() {
        let mut config = AgentConfig::default();
        config.join_keywords = vec!["  Enter Room ".into()];
        let script = AgentScript::render(&config).unwrap();
        assert!(script.source().contains(r#"var JOIN_KEYWORDS = ["enter room"];"#));
    }

    #[test]
    fn test_render_embeds_selectors_and_stylesheet() {
        let script = AgentScript::render(&AgentConfig::default()).unwrap();
        let src = script.source();
        assert!(src.contains(r#""textInputs":"textarea, input[type=\"text\"], input:not([type])""#));
        assert!(src.contains("100vw"));
        assert!(src.contains(STYLE_ELEMENT_ID));
    }

    #[test]
    fn test_render_rejects_invalid_config() {
        let mut config = AgentConfig::default();
        config.join_keywords.clear();
        assert!(AgentScript::render(&config).is_err());
    }

    #[test]
    fn test_send_text_call_shape() {
        let call = send_text_call("hi");
        assert!(call.contains("window[\"__a3sConversationAgent\"]"));
        assert!(call.contains("a.sendText(\"hi\")"));
        assert!(call.ends_with("true;"));
    }
}
