//! Control protocol frames.
//!
//! Every frame is one JSON object on one line, discriminated by `type`.
//!
//! | Direction | `type`             | Payload                                   |
//! |-----------|--------------------|-------------------------------------------|
//! | inbound   | `process_start`    | `session_id?`                             |
//! | inbound   | `session_message`  | `text` or `content: [{type, text?}]`      |
//! | outbound  | `process_ready`    | `session_id`                              |
//! | outbound  | `session_started`  | `session_id`                              |
//! | outbound  | `session_complete` | `session_id`, `result{...metrics}`        |
//! | outbound  | `process_error`    | `message`                                 |
//! | outbound  | `process_stopped`  | none                                      |

use serde::{Deserialize, Serialize};

use crate::models::message::{extract_segment_text, ContentSegment};
use crate::models::session::SessionMetrics;
use crate::{AppError, Result};

/// Session id reported in `process_ready` when nothing has been resolved yet.
pub const PLACEHOLDER_SESSION_ID: &str = "pending";

/// Frames the orchestrator writes to the agent process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Opens a session, optionally resuming an earlier one.
    ProcessStart {
        /// Session to resume.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// Carries the user prompt for the session.
    SessionMessage {
        /// Prompt as a plain string.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Prompt as ordered content blocks.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Vec<ContentSegment>>,
    },
}

impl InboundFrame {
    /// Parse one line into a frame.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if the line is not JSON or names an
    /// unknown frame type.
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim())
            .map_err(|e| AppError::Protocol(format!("malformed frame: {e}")))
    }

    /// Wire name of the frame type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProcessStart { .. } => "process_start",
            Self::SessionMessage { .. } => "session_message",
        }
    }

    /// Prompt text carried by a `session_message`.
    ///
    /// `text` wins over `content`; blank results count as missing.
    #[must_use]
    pub fn message_text(&self) -> Option<String> {
        let Self::SessionMessage { text, content } = self else {
            return None;
        };

        let extracted = match (text, content) {
            (Some(text), _) => text.clone(),
            (None, Some(segments)) => extract_segment_text(segments),
            (None, None) => return None,
        };

        if extracted.trim().is_empty() {
            None
        } else {
            Some(extracted)
        }
    }
}

/// Frames the agent process writes back to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Start accepted; waiting for the prompt.
    ProcessReady {
        /// Resume id, or [`PLACEHOLDER_SESSION_ID`].
        session_id: String,
    },
    /// The engine reported its durable session id.
    SessionStarted {
        /// Durable session id.
        session_id: String,
    },
    /// Execution finished.
    SessionComplete {
        /// Durable session id.
        session_id: String,
        /// Metrics from the terminal result.
        result: SessionMetrics,
    },
    /// The session failed.
    ProcessError {
        /// Failure message.
        message: String,
    },
    /// Always the final frame.
    ProcessStopped,
}

impl OutboundFrame {
    /// Wire name of the frame type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProcessReady { .. } => "process_ready",
            Self::SessionStarted { .. } => "session_started",
            Self::SessionComplete { .. } => "session_complete",
            Self::ProcessError { .. } => "process_error",
            Self::ProcessStopped => "process_stopped",
        }
    }
}
