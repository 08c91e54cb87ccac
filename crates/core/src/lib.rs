//! # sessionwatch-core
//!
//! Domain model and analysis for coding-agent conversation logs.
//!
//! A coding agent writes one append-only JSONL event log per conversation.
//! This crate provides:
//! - Typed events and lenient wire decoding ([`event`])
//! - A line-delimited log parser that tolerates partial writes ([`log`])
//! - A parser for the tiny `workspace.yaml` metadata sidecar ([`workspace`])
//! - The status analyzer that classifies a conversation from its event
//!   history ([`status`])
//! - The [`Conversation`] value type flowing to subscribers
//!
//! Everything here is pure data and pure functions; filesystem observation
//! lives in `sessionwatch-watcher`.

pub mod conversation;
pub mod event;
pub mod log;
pub mod status;
pub mod workspace;

pub use conversation::{Conversation, StorageKind};
pub use event::{Event, EventKind, EventPayload, ToolRequest};
pub use status::{analyze, ConversationStatus, StatusCode};
pub use workspace::WorkspaceInfo;
