//! Typed conversation events and their wire decoding.
//!
//! The agent's log format is one JSON object per line:
//! ```jsonl
//! {"type":"user-message","timestamp":"2025-06-01T10:00:00Z","data":{"content":"hi"}}
//! {"type":"assistant-turn-start","timestamp":1748772000000,"data":{"turnId":"turn-1"}}
//! ```
//!
//! Decoding is deliberately lenient: unrecognized `type` strings become
//! [`EventKind::Unknown`], unknown fields are ignored, and a `timestamp`
//! that is neither an RFC 3339 string nor an epoch-milliseconds number
//! decodes to `None` rather than failing the line.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Kind of a single log event.
///
/// Wire names are the kebab-case form (`"user-message"`, `"abort"`, ...).
/// Anything else decodes to [`EventKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    UserMessage,
    AssistantTurnStart,
    AssistantTurnEnd,
    AssistantMessage,
    ToolExecutionStart,
    ToolExecutionComplete,
    Abort,
    SessionStart,
    #[serde(other)]
    Unknown,
}

/// One line of a conversation log. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// When the agent emitted this event. Absence is legal.
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "data",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<EventPayload>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: None,
            payload: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Turn identifier carried by the payload, if any.
    pub fn turn_id(&self) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.turn_id.as_deref())
    }

    /// Message text carried by the payload, if any.
    pub fn content(&self) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.content.as_deref())
    }

    /// Tool call identifier carried by the payload, if any.
    pub fn tool_call_id(&self) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.tool_call_id.as_deref())
    }

    /// Tool name carried by the payload, if any.
    pub fn tool_name(&self) -> Option<&str> {
        self.payload.as_ref().and_then(|p| p.tool_name.as_deref())
    }

    /// Tool requests attached to the payload. Absence reads as empty.
    pub fn tool_requests(&self) -> &[ToolRequest] {
        self.payload
            .as_ref()
            .map(|p| p.tool_requests.as_slice())
            .unwrap_or(&[])
    }
}

/// Recognized `data` fields of an event. Every field is optional; the
/// kind-to-payload mapping is advisory and the analyzer tolerates gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_requests: Vec<ToolRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl EventPayload {
    pub fn with_turn_id(mut self, turn_id: impl Into<String>) -> Self {
        self.turn_id = Some(turn_id.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_tool_requests(mut self, requests: Vec<ToolRequest>) -> Self {
        self.tool_requests = requests;
        self
    }

    pub fn with_tool_call(
        mut self,
        id: impl Into<String>,
        name: Option<&str>,
    ) -> Self {
        self.tool_call_id = Some(id.into());
        self.tool_name = name.map(str::to_string);
        self
    }
}

/// A tool invocation requested by an assistant message. Only presence
/// matters to the analyzer; the fields are kept for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolRequest {
    #[serde(alias = "toolCallId", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "toolName", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Timestamps arrive as RFC 3339 strings or epoch milliseconds; anything
/// unparseable becomes `None`.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(parse_timestamp_value))
}

fn parse_timestamp_value(value: serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
