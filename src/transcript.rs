//! Durable transcript reader.
//!
//! The agent's durable log is JSONL: one entry per line, each wrapping a
//! model message. This reader turns such a log into [`ConfirmedMessage`]s
//! in log order, skipping lines it cannot use and dropping the engine's
//! internal placeholder entries that were never meant for the user.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::models::message::{ConfirmedMessage, MessageContent, Role};

/// Assistant texts the engine writes when it has nothing to say.
pub const INTERNAL_ARTIFACT_TEXTS: &[&str] = &["No response requested."];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogEntry {
    #[serde(rename = "type")]
    kind: String,
    uuid: String,
    #[serde(default)]
    parent_uuid: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    message: LogMessage,
}

#[derive(Debug, Deserialize)]
struct LogMessage {
    role: Role,
    content: MessageContent,
}

/// Parse a JSONL transcript into confirmed messages.
///
/// Blank lines, malformed lines, and entries other than `user`,
/// `assistant`, or `system` are skipped.
#[must_use]
pub fn parse_transcript(raw: &str) -> Vec<ConfirmedMessage> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<LogEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "transcript: skipping unreadable entry");
                None
            }
        })
        .filter(|entry| matches!(entry.kind.as_str(), "user" | "assistant" | "system"))
        .map(|entry| ConfirmedMessage {
            id: entry.uuid,
            role: entry.message.role,
            content: entry.message.content,
            parent_id: entry.parent_uuid,
            timestamp: entry.timestamp,
        })
        .filter(|message| !is_internal_artifact(message))
        .collect()
}

/// Whether `message` is an engine placeholder rather than real output.
///
/// Only a lone text block from the assistant with no tool invocation
/// alongside it qualifies.
#[must_use]
pub fn is_internal_artifact(message: &ConfirmedMessage) -> bool {
    if message.role != Role::Assistant {
        return false;
    }

    let text = match &message.content {
        MessageContent::Text(text) => text.as_str(),
        MessageContent::Segments(segments) => match segments.as_slice() {
            [only] if only.kind == "text" => only.text.as_deref().unwrap_or_default(),
            _ => return false,
        },
    };

    INTERNAL_ARTIFACT_TEXTS.contains(&text.trim())
}
