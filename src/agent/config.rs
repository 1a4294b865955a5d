//! Guest agent vocabulary and timing
//!
//! Everything the agent matches against guest markup lives here as data so
//! it can be tuned without touching the state machine. These lists are
//! heuristics over third-party UI copy: when the guest page changes its
//! wording they stop matching silently.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Marks a `<video>` element as the local camera preview
///
/// Matches when the element carries `attribute`, and, if `contains` is set,
/// the attribute value contains that substring (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfViewMarker {
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
}

impl SelfViewMarker {
    pub fn present(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            contains: None,
        }
    }

    pub fn containing(attribute: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            contains: Some(needle.into()),
        }
    }

    /// Attribute selector for this marker, e.g. `[class*="local" i]`
    pub fn attribute_selector(&self) -> String {
        match &self.contains {
            None => format!("[{}]", self.attribute),
            Some(needle) => format!("[{}*=\"{}\" i]", self.attribute, needle),
        }
    }

    /// CSS selector for videos carrying this marker
    pub fn css(&self) -> String {
        format!("video{}", self.attribute_selector())
    }
}

/// Guest agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Fixed scan interval, written as `"500ms"` or `"2s"`
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Labels of controls that join the call
    #[serde(default = "default_join_keywords")]
    pub join_keywords: Vec<String>,

    /// Labels of controls that submit a chat message
    #[serde(default = "default_send_keywords")]
    pub send_keywords: Vec<String>,

    /// Text of third-party chrome to hide once the avatar is live
    #[serde(default = "default_chrome_deny_list")]
    pub chrome_deny_list: Vec<String>,

    #[serde(default = "default_self_view_markers")]
    pub self_view_markers: Vec<SelfViewMarker>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            join_keywords: default_join_keywords(),
            send_keywords: default_send_keywords(),
            chrome_deny_list: default_chrome_deny_list(),
            self_view_markers: default_self_view_markers(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_join_keywords() -> Vec<String> {
    words(&["join", "start", "ready"])
}

fn default_send_keywords() -> Vec<String> {
    words(&["send"])
}

fn default_chrome_deny_list() -> Vec<String> {
    words(&[
        "leave call",
        "leave meeting",
        "turn on camera",
        "turn off camera",
        "turn on mic",
        "turn off mic",
        "mute",
        "unmute",
        "participants",
        "people in call",
        "waiting for",
        "is waiting",
        "allow access",
        "camera and microphone",
        "permission",
        "share screen",
        "network quality",
    ])
}

fn default_self_view_markers() -> Vec<SelfViewMarker> {
    vec![
        SelfViewMarker::present("data-local"),
        SelfViewMarker::containing("class", "local"),
        SelfViewMarker::containing("class", "self-view"),
        SelfViewMarker::containing("id", "local"),
    ]
}

impl AgentConfig {
    /// Parse from TOML; unset keys keep the built-in vocabulary
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval must be > 0".to_string()));
        }
        if self.join_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "join_keywords must contain at least one keyword".to_string(),
            ));
        }
        for marker in &self.self_view_markers {
            let valid_attr = !marker.attribute.is_empty()
                && marker
                    .attribute
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid_attr {
                return Err(ConfigError::Invalid(format!(
                    "self-view marker attribute '{}' is not a plain attribute name",
                    marker.attribute
                )));
            }
            if let Some(needle) = &marker.contains {
                if needle.is_empty() || needle.contains(|c: char| matches!(c, '"' | '\\' | ']')) {
                    return Err(ConfigError::Invalid(format!(
                        "self-view marker value '{}' is empty or contains reserved characters",
                        needle
                    )));
                }
            }
        }
        Ok(())
    }

    /// Lowercase, trimmed copy with blank entries dropped
    pub fn normalized(&self) -> Self {
        fn norm(list: &[String]) -> Vec<String> {
            list.iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        }
        Self {
            poll_interval: self.poll_interval,
            join_keywords: norm(&self.join_keywords),
            send_keywords: norm(&self.send_keywords),
            chrome_deny_list: norm(&self.chrome_deny_list),
            self_view_markers: self
                .self_view_markers
                .iter()
                .map(|m| SelfViewMarker {
                    attribute: m.attribute.to_lowercase(),
                    contains: m.contains.as_ref().map(|c| c.to_lowercase()),
                })
                .collect(),
        }
    }

    /// Stylesheet installed once the avatar is live
    ///
    /// Hides local self-view videos, removes page chrome margins, and
    /// stretches the remaining video over the viewport.
    pub fn stylesheet(&self) -> String {
        let self_view: Vec<String> = self.self_view_markers.iter().map(|m| m.css()).collect();
        let remote = self
            .self_view_markers
            .iter()
            .fold("video".to_string(), |acc, m| {
                format!("{}:not({})", acc, m.attribute_selector())
            });

        let mut css = String::from(
            "html, body { margin: 0 !important; padding: 0 !important; width: 100% !important; \
             height: 100% !important; overflow: hidden !important; background: #000 !important; }\n",
        );
        if !self_view.is_empty() {
            css.push_str(&format!("{} {{ display: none !important; }}\n", self_view.join(", ")));
        }
        css.push_str(&format!(
            "{} {{ position: fixed !important; top: 0 !important; left: 0 !important; \
             width: 100vw !important; height: 100vh !important; object-fit: cover !important; \
             z-index: 2147483000 !important; }}\n",
            remote
        ));
        css
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{}ms", d.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(d)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        if let Some(v) = s.strip_suffix("ms") {
            return v
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string());
        }
        if let Some(v) = s.strip_suffix('s') {
            return v
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string());
        }
        Err(format!("unknown duration format: '{s}' (use '2s' or '500ms')"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert!(config.join_keywords.contains(&"join".to_string()));
    }

    #[test]
    fn test_from_toml_overrides_and_defaults() {
        let config = AgentConfig::from_toml_str(
            r#"
            poll_interval = "2s"
            join_keywords = ["Enter Room"]
            "#,
        )
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.join_keywords, vec!["Enter Room"]);
        assert_eq!(config.send_keywords, vec!["send"]);
        assert!(!config.chrome_deny_list.is_empty());
    }

    #[test]
    fn test_from_toml_markers() {
        let config = AgentConfig::from_toml_str(
            r#"
            [[self_view_markers]]
            attribute = "data-self"
            "#,
        )
        .unwrap();
        assert_eq!(config.self_view_markers, vec![SelfViewMarker::present("data-self")]);
    }

    #[test]
    fn test_bad_duration_rejected() {
        assert!(AgentConfig::from_toml_str(r#"poll_interval = "soon""#).is_err());
        assert!(duration_serde::parse_duration("250ms").is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval_and_empty_join() {
        let mut config = AgentConfig::default();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.join_keywords = vec!["  ".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_selector_injection() {
        let mut config = AgentConfig::default();
        config.self_view_markers = vec![SelfViewMarker::containing("class", "a\"] body")];
        assert!(config.validate().is_err());

        config.self_view_markers = vec![SelfViewMarker::present("data local")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normalized_lowercases_and_drops_blanks() {
        let mut config = AgentConfig::default();
        config.join_keywords = vec![" JOIN ".into(), "".into(), "Start".into()];
        let normalized = config.normalized();
        assert_eq!(normalized.join_keywords, vec!["join", "start"]);
    }

    #[test]
    fn test_stylesheet_hides_self_view_and_stretches_remote() {
        let mut config = AgentConfig::default();
        config.self_view_markers = vec![
            SelfViewMarker::present("data-local"),
            SelfViewMarker::containing("class", "local"),
        ];
        let css = config.stylesheet();
        assert!(css.contains("video[data-local], video[class*=\"local\" i] { display: none !important; }"));
        assert!(css.contains("video:not([data-local]):not([class*=\"local\" i]) {"));
        assert!(css.contains("100vw"));
    }
}
