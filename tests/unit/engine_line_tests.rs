//! Unit tests for agent CLI stream-json line parsing.

use serde_json::json;

use session_relay::engine::cli_engine::parse_engine_line;
use session_relay::engine::EngineEvent;
use session_relay::models::message::Role;
use session_relay::models::session::SessionMetrics;
use session_relay::AppError;

#[test]
fn init_line_yields_session_init() {
    let line = json!({"type": "system", "subtype": "init", "session_id": "abc", "tools": []});

    let event = parse_engine_line(&line.to_string()).expect("parse");

    assert_eq!(
        event,
        Some(EngineEvent::SessionInit {
            session_id: "abc".into()
        })
    );
}

#[test]
fn non_init_system_line_is_skipped() {
    let line = json!({"type": "system", "subtype": "compact_boundary", "session_id": "abc"});
    assert_eq!(parse_engine_line(&line.to_string()).expect("parse"), None);
}

#[test]
fn result_line_carries_metrics() {
    let line = json!({
        "type": "result",
        "subtype": "success",
        "session_id": "abc",
        "duration_ms": 4200,
        "duration_api_ms": 3100,
        "total_cost_usd": 0.0123,
        "num_turns": 3,
        "result": "done"
    });

    let event = parse_engine_line(&line.to_string()).expect("parse");

    assert_eq!(
        event,
        Some(EngineEvent::Result {
            session_id: Some("abc".into()),
            metrics: SessionMetrics {
                duration_ms: 4200,
                duration_api_ms: 3100,
                total_cost_usd: 0.0123,
                num_turns: 3,
            },
        })
    );
}

#[test]
fn result_line_without_metrics_defaults_to_zero() {
    let event = parse_engine_line("{\"type\":\"result\"}").expect("parse");
    assert_eq!(
        event,
        Some(EngineEvent::Result {
            session_id: None,
            metrics: SessionMetrics::default(),
        })
    );
}

#[test]
fn assistant_line_yields_extracted_text() {
    let line = json!({
        "type": "assistant",
        "message": {
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Creating "},
                {"type": "tool_use", "id": "t1", "name": "Write", "input": {}},
                {"type": "text", "text": "index.html"}
            ]
        }
    });

    let event = parse_engine_line(&line.to_string()).expect("parse");

    assert_eq!(
        event,
        Some(EngineEvent::Message {
            role: Role::Assistant,
            text: "Creating index.html".into(),
        })
    );
}

#[test]
fn tool_only_message_is_skipped() {
    let line = json!({
        "type": "user",
        "message": {
            "role": "user",
            "content": [{"type": "tool_result", "tool_use_id": "t1", "content": "ok"}]
        }
    });
    assert_eq!(parse_engine_line(&line.to_string()).expect("parse"), None);
}

#[test]
fn unknown_line_type_is_skipped() {
    let event = parse_engine_line("{\"type\":\"stream_event\",\"event\":{}}").expect("parse");
    assert_eq!(event, None);
}

#[test]
fn blank_line_is_skipped() {
    assert_eq!(parse_engine_line("   ").expect("parse"), None);
}

#[test]
fn malformed_line_is_a_protocol_error() {
    let err = parse_engine_line("{not json").expect_err("malformed");
    assert!(matches!(err, AppError::Protocol(ref msg) if msg.starts_with("malformed engine line")));
}
