//! Core conversation types
//!
//! Wire types use the provisioning backend's snake_case field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single payload the guest agent posts once remote media is live
pub const AVATAR_READY_MESSAGE: &str = "a3s:avatar-ready";

/// One provisioned remote conversation session
///
/// The backend owns the authoritative copy; `status` here is advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Backend-assigned session id
    #[serde(rename = "conversation_id")]
    pub id: String,

    /// Opaque address of the live room, loaded by the bridge
    #[serde(rename = "conversation_url")]
    pub join_url: String,

    #[serde(default)]
    pub status: SessionStatus,

    #[serde(default, rename = "conversation_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,

    #[serde(default, with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Present once the backend has ended the session
    #[serde(default, with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Call duration in seconds, present once ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl ConversationSession {
    /// Whether the backend reported this session as ended
    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended || self.ended_at.is_some()
    }
}

/// Session status as last reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Freshly created sessions omit status; they are live
    #[default]
    Active,
    Ended,
    /// A status this client does not know about
    #[serde(other)]
    Unknown,
}

/// Parameters for creating a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Replica (avatar) reference; required and non-empty
    pub replica_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,

    /// Display name of the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_name: Option<String>,

    /// Free-text context handed to the replica
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversational_context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_greeting: Option<String>,

    /// Backend posts lifecycle webhooks here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,

    #[serde(default, skip_serializing_if = "ConversationProperties::is_empty")]
    pub properties: ConversationProperties,
}

impl ConversationConfig {
    /// Create a config for the given replica
    pub fn new(replica_id: impl Into<String>) -> Self {
        Self {
            replica_id: replica_id.into(),
            ..Default::default()
        }
    }

    pub fn with_persona(mut self, persona_id: impl Into<String>) -> Self {
        self.persona_id = Some(persona_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.conversation_name = Some(name.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.conversational_context = Some(context.into());
        self
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.custom_greeting = Some(greeting.into());
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn with_properties(mut self, properties: ConversationProperties) -> Self {
        self.properties = properties;
        self
    }
}

/// Behavioral properties of a session
///
/// Unset fields are omitted so the backend applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationProperties {
    /// Hard cap on call length, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_call_duration: Option<u64>,

    /// Seconds to keep the room open after the participant leaves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_left_timeout: Option<u64>,

    /// Seconds to wait for a participant who never joins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_absent_timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_recording: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_transcription: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ConversationProperties {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A message posted by the guest document to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestMessage {
    /// Remote media is live
    AvatarReady,
    /// Anything else; ignored by the bridge
    Unrecognized(String),
}

impl GuestMessage {
    pub fn parse(payload: &str) -> Self {
        if payload.trim() == AVATAR_READY_MESSAGE {
            GuestMessage::AvatarReady
        } else {
            GuestMessage::Unrecognized(payload.to_string())
        }
    }
}

/// Accepts RFC 3339 as well as the naive `YYYY-MM-DD HH:MM:SS[.f]` form
/// some backend endpoints emit.
mod lenient_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_str(&ts.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse(s).map(Some).map_err(serde::de::Error::custom),
        }
    }

    pub(super) fn parse(s: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Ok(ts.with_timezone(&Utc));
        }
        for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(naive.and_utc());
            }
        }
        Err(format!("unrecognized timestamp: '{s}'"))
    }
}
