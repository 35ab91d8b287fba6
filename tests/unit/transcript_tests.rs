//! Unit tests for the durable transcript reader.

use serde_json::json;

use session_relay::models::message::{MessageContent, Role};
use session_relay::transcript::parse_transcript;

fn entry(kind: &str, uuid: &str, parent: Option<&str>, role: &str, content: serde_json::Value) -> String {
    json!({
        "type": kind,
        "uuid": uuid,
        "parentUuid": parent,
        "timestamp": "2026-10-18T09:30:00Z",
        "sessionId": "abc",
        "message": {"role": role, "content": content}
    })
    .to_string()
}

#[test]
fn entries_are_returned_in_log_order() {
    let raw = [
        entry("user", "u1", None, "user", json!("Build me a site")),
        entry(
            "assistant",
            "a1",
            Some("u1"),
            "assistant",
            json!([{"type": "text", "text": "On it."}]),
        ),
    ]
    .join("\n");

    let messages = parse_transcript(&raw);

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, "u1");
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].text(), "Build me a site");
    assert_eq!(messages[1].parent_id.as_deref(), Some("u1"));
    assert_eq!(messages[1].text(), "On it.");
    assert!(messages[1].timestamp.is_some());
}

#[test]
fn placeholder_assistant_entry_is_dropped() {
    let raw = [
        entry("user", "u1", None, "user", json!("ok thanks")),
        entry(
            "assistant",
            "a1",
            Some("u1"),
            "assistant",
            json!([{"type": "text", "text": "No response requested."}]),
        ),
        entry("assistant", "a2", Some("a1"), "assistant", json!("No response requested.")),
    ]
    .join("\n");

    let messages = parse_transcript(&raw);

    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["u1"]);
}

#[test]
fn placeholder_alongside_tool_use_is_kept() {
    let raw = entry(
        "assistant",
        "a1",
        None,
        "assistant",
        json!([
            {"type": "text", "text": "No response requested."},
            {"type": "tool_use", "id": "t1", "name": "Read", "input": {}}
        ]),
    );

    let messages = parse_transcript(&raw);

    assert_eq!(messages.len(), 1);
    match &messages[0].content {
        MessageContent::Segments(segments) => assert!(segments[1].is_tool_use()),
        MessageContent::Text(_) => panic!("expected segmented content"),
    }
}

#[test]
fn placeholder_text_from_user_is_kept() {
    let raw = entry("user", "u1", None, "user", json!("No response requested."));
    assert_eq!(parse_transcript(&raw).len(), 1);
}

#[test]
fn malformed_blank_and_foreign_lines_are_skipped() {
    let raw = [
        "{not json".to_owned(),
        String::new(),
        json!({"type": "summary", "summary": "Site build", "leafUuid": "a1"}).to_string(),
        entry("user", "u1", None, "user", json!("hello")),
    ]
    .join("\n");

    let messages = parse_transcript(&raw);

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "u1");
}
