//! Line-delimited log parsing.
//!
//! Event logs are appended concurrently by the agent process, so the last
//! line may be truncated mid-write and individual lines may be garbage.
//! A bad line must never poison the rest of the stream: decoding skips it
//! silently and carries on. Only I/O failures are reported, and only by
//! the file-reading variant.

use crate::event::Event;
use std::io;
use std::path::Path;

/// Parse a text blob of newline-delimited JSON records into events.
///
/// Leading/trailing whitespace is trimmed, empty lines are ignored, and
/// lines that fail to decode are dropped without error.
pub fn parse_events(text: &str) -> Vec<Event> {
    text.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<Event>(line).ok())
        .collect()
}

/// Read a log file as UTF-8 and parse it with [`parse_events`].
pub fn read_events(path: &Path) -> io::Result<Vec<Event>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_events(&text))
}

/// True iff at least one line of `text` parses as valid JSON.
pub fn looks_like_jsonl(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && serde_json::from_str::<serde_json::Value>(line).is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, EventPayload};

    #[test]
    fn test_parse_basic_log() {
        let log = concat!(
            r#"{"type":"user-message","data":{"content":"hello"}}"#,
            "\n",
            r#"{"type":"assistant-turn-start","data":{"turnId":"t1"}}"#,
            "\n",
        );
        let events = parse_events(log);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::UserMessage);
        assert_eq!(events[0].content(), Some("hello"));
        assert_eq!(events[1].turn_id(), Some("t1"));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let log = concat!(
            "not json at all\n",
            r#"{"type":"user-message"}"#,
            "\n",
            "{\"type\":\"assistant-turn-en", // truncated mid-write
        );
        let events = parse_events(log);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::UserMessage);
    }

    #[test]
    fn test_interleaved_garbage_does_not_change_result() {
        let clean = concat!(
            r#"{"type":"user-message"}"#,
            "\n",
            r#"{"type":"assistant-turn-end"}"#,
            "\n",
        );
        let dirty = concat!(
            "### log opened\n",
            r#"{"type":"user-message"}"#,
            "\n",
            "garbage line\n",
            r#"{"type":"assistant-turn-end"}"#,
            "\n",
        );
        let a = parse_events(clean);
        let b = parse_events(dirty);
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].kind, b[0].kind);
        assert_eq!(a[1].kind, b[1].kind);
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(parse_events("").is_empty());
        assert!(parse_events("  \n\n   \n").is_empty());
    }

    #[test]
    fn test_serialize_reparse_roundtrip() {
        let events = vec![
            Event::new(EventKind::UserMessage)
                .with_payload(EventPayload::default().with_content("hi")),
            Event::new(EventKind::AssistantTurnStart)
                .with_payload(EventPayload::default().with_turn_id("t1")),
            Event::new(EventKind::AssistantTurnEnd),
        ];
        let log: String = events
            .iter()
            .map(|e| serde_json::to_string(e).unwrap() + "\n")
            .collect();

        let parsed = parse_events(&log);
        assert_eq!(parsed.len(), events.len());
        for (orig, back) in events.iter().zip(&parsed) {
            assert_eq!(orig.kind, back.kind);
            assert_eq!(orig.content(), back.content());
            assert_eq!(orig.turn_id(), back.turn_id());
        }
    }

    #[test]
    fn test_read_events_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "{\"type\":\"user-message\"}\n").unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 1);

        let missing = dir.path().join("absent.jsonl");
        assert!(read_events(&missing).is_err());
    }

    #[test]
    fn test_looks_like_jsonl() {
        assert!(looks_like_jsonl("{\"type\":\"abort\"}\n"));
        assert!(looks_like_jsonl("junk\n{\"a\":1}\n"));
        assert!(!looks_like_jsonl("plain text\nmore text\n"));
        assert!(!looks_like_jsonl(""));
    }
}
