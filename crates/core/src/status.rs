//! Conversation status analysis.
//!
//! The agent never writes an explicit "blocked on the user" marker, so the
//! status has to be inferred from the ordered event history. [`analyze`] is
//! a pure function over an event slice; it does no I/O and the same input
//! always produces the same verdict.

use crate::event::{Event, EventKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Maximum length of the `last_message` excerpt, in characters.
pub const LAST_MESSAGE_MAX_CHARS: usize = 200;

/// Classification of a conversation's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// No events to judge from.
    Empty,
    /// The agent opened a turn that has not yet closed.
    Processing,
    /// A turn ended with a textual reply; the user's move.
    WaitingForUser,
    /// A tool execution started and was never completed or aborted.
    WaitingForApproval,
    /// The user spoke and no turn has closed since.
    UserWaiting,
    /// A turn ended without a reply that needs answering.
    Ready,
    Unknown,
}

impl StatusCode {
    /// True for the codes that should surface to the user.
    pub fn needs_attention(&self) -> bool {
        matches!(self, StatusCode::WaitingForUser | StatusCode::WaitingForApproval)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Empty => "empty",
            StatusCode::Processing => "processing",
            StatusCode::WaitingForUser => "waiting_for_user",
            StatusCode::WaitingForApproval => "waiting_for_approval",
            StatusCode::UserWaiting => "user_waiting",
            StatusCode::Ready => "ready",
            StatusCode::Unknown => "unknown",
        }
    }
}

/// The analyzer's verdict for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationStatus {
    pub code: StatusCode,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    /// Excerpt of the assistant's final reply, at most
    /// [`LAST_MESSAGE_MAX_CHARS`] characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConversationStatus {
    fn new(code: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            turn_id: None,
            last_message: None,
            timestamp: None,
        }
    }

    pub fn needs_attention(&self) -> bool {
        self.code.needs_attention()
    }
}

/// Classify a conversation from its full event history.
pub fn analyze(events: &[Event]) -> ConversationStatus {
    if events.is_empty() {
        return ConversationStatus::new(StatusCode::Empty, "No events");
    }

    // A log file may concatenate several sessions when the agent restarts
    // and reuses it. Only events after the last session boundary count.
    let scoped = scope_to_current_session(events);
    if scoped.is_empty() {
        return ConversationStatus::new(StatusCode::Empty, "No events in current session");
    }

    if let Some(status) = pending_approval(scoped) {
        return status;
    }

    classify_by_turns(scoped)
}

/// Events strictly after the last `session-start` marker, or the full
/// list when no marker exists. The marker itself is a boundary, not an
/// event of the new session.
fn scope_to_current_session(events: &[Event]) -> &[Event] {
    match events
        .iter()
        .rposition(|e| e.kind == EventKind::SessionStart)
    {
        Some(idx) => &events[idx + 1..],
        None => events,
    }
}

/// Detect a tool execution that started but never completed. Takes
/// precedence over turn-based rules; abandoned entirely if an abort is
/// seen anywhere in the scoped events.
fn pending_approval(events: &[Event]) -> Option<ConversationStatus> {
    let mut started: HashSet<&str> = HashSet::new();
    let mut completed: HashSet<&str> = HashSet::new();
    // Last start event index per call id, for naming the tool.
    let mut last_start: HashMap<&str, usize> = HashMap::new();

    for (idx, event) in events.iter().enumerate() {
        match event.kind {
            EventKind::ToolExecutionStart => {
                if let Some(id) = event.tool_call_id() {
                    started.insert(id);
                    last_start.insert(id, idx);
                }
            }
            EventKind::ToolExecutionComplete => {
                if let Some(id) = event.tool_call_id() {
                    completed.insert(id);
                }
            }
            EventKind::Abort => return None,
            _ => {}
        }
    }

    let pending: Vec<&str> = started.difference(&completed).copied().collect();
    if pending.is_empty() {
        return None;
    }

    let newest = pending
        .iter()
        .filter_map(|id| last_start.get(id).map(|idx| (*idx, *id)))
        .max_by_key(|(idx, _)| *idx)?;
    let reason = match events[newest.0].tool_name() {
        Some(name) => format!("Tool '{}' waiting for approval", name),
        None => "Tool waiting for approval".to_string(),
    };

    let mut status = ConversationStatus::new(StatusCode::WaitingForApproval, reason);
    status.timestamp = events.last().and_then(|e| e.timestamp);
    Some(status)
}

/// Turn-boundary classification: compare the last user message, turn
/// start and turn end to decide whose move it is.
fn classify_by_turns(events: &[Event]) -> ConversationStatus {
    let last_of = |kind: EventKind| -> Option<usize> {
        events.iter().rposition(|e| e.kind == kind)
    };
    let user = last_of(EventKind::UserMessage);
    let turn_end = last_of(EventKind::AssistantTurnEnd);
    let turn_start = last_of(EventKind::AssistantTurnStart);

    let after = |a: Option<usize>, b: Option<usize>| match (a, b) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        _ => false,
    };

    if after(turn_start, turn_end) {
        let start = &events[turn_start.unwrap()];
        let mut status = ConversationStatus::new(StatusCode::Processing, "Agent is processing");
        status.turn_id = start.turn_id().map(str::to_string);
        status.timestamp = events.last().and_then(|e| e.timestamp);
        return status;
    }

    if after(turn_end, user) {
        return classify_finished_turn(events, turn_end.unwrap());
    }

    if after(user, turn_end) {
        let message = &events[user.unwrap()];
        let mut status =
            ConversationStatus::new(StatusCode::UserWaiting, "User message sent, awaiting agent");
        status.timestamp = message.timestamp;
        return status;
    }

    ConversationStatus::new(StatusCode::Unknown, "Unable to determine state")
}

/// A turn has ended with no newer user input. Walk backwards from the end
/// marker: a textual assistant message means the user owes a response; a
/// message carrying tool requests, or no message before the turn opened,
/// means nothing is owed.
fn classify_finished_turn(events: &[Event], end_idx: usize) -> ConversationStatus {
    let last_timestamp = events.last().and_then(|e| e.timestamp);

    for event in events[..end_idx].iter().rev() {
        match event.kind {
            EventKind::AssistantMessage => {
                if event.tool_requests().is_empty() {
                    let mut status = ConversationStatus::new(
                        StatusCode::WaitingForUser,
                        "Agent completed turn, awaiting user response",
                    );
                    status.last_message = event.content().map(truncate_message);
                    status.timestamp = last_timestamp;
                    return status;
                }
                break;
            }
            EventKind::AssistantTurnStart => break,
            _ => {}
        }
    }

    let mut status = ConversationStatus::new(StatusCode::Ready, "Turn complete");
    status.timestamp = last_timestamp;
    status
}

fn truncate_message(content: &str) -> String {
    content.chars().take(LAST_MESSAGE_MAX_CHARS).collect()
}
