//! Conversation message models: confirmed log entries and optimistic
//! client-side entries awaiting confirmation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::SessionStatus;

/// Author of a conversation entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Entry written by the end user.
    User,
    /// Entry produced by the agent.
    Assistant,
    /// Entry injected by the system.
    System,
}

/// One typed block of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentSegment {
    /// Block type (`text`, `tool_use`, `tool_result`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload for `text` blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentSegment {
    /// Build a `text` segment.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: Some(text.into()),
        }
    }

    /// Whether this segment records a tool invocation.
    #[must_use]
    pub fn is_tool_use(&self) -> bool {
        self.kind == "tool_use"
    }
}

/// Message content: a bare string or an ordered list of segments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text body.
    Text(String),
    /// Ordered content blocks.
    Segments(Vec<ContentSegment>),
}

impl MessageContent {
    /// Concatenate the text of all `text` segments in order.
    #[must_use]
    pub fn extract_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Segments(segments) => extract_segment_text(segments),
        }
    }
}

/// Concatenate the text of every `text` segment, preserving order.
#[must_use]
pub fn extract_segment_text(segments: &[ContentSegment]) -> String {
    segments
        .iter()
        .filter(|segment| segment.kind == "text")
        .filter_map(|segment| segment.text.as_deref())
        .collect()
}

/// A durable, authoritative conversation entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedMessage {
    /// Unique entry identifier.
    pub id: String,
    /// Entry author.
    pub role: Role,
    /// Entry body.
    pub content: MessageContent,
    /// Identifier of the preceding entry in the log.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// When the entry was written.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConfirmedMessage {
    /// Extracted plain text of this entry.
    #[must_use]
    pub fn text(&self) -> String {
        self.content.extract_text()
    }
}

/// A client-local optimistic entry awaiting confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingMessage {
    /// Client-generated identifier.
    pub id: String,
    /// Submitted text, matched verbatim against confirmed user entries.
    pub text: String,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl PendingMessage {
    /// Create a pending entry stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Conversation state as returned by the orchestrator's read endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    /// Status of the conversation's current session.
    pub status: SessionStatus,
    /// Full ordered confirmed sequence.
    #[serde(default)]
    pub messages: Vec<ConfirmedMessage>,
    /// Failure text when `status` is errored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ConversationState {
    /// An empty state with the given status.
    #[must_use]
    pub fn empty(status: SessionStatus) -> Self {
        Self {
            status,
            messages: Vec::new(),
            error_message: None,
        }
    }
}
