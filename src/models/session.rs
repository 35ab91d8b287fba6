//! Session model and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status for an agent session or an observed conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but the engine has not started executing.
    Pending,
    /// The engine is executing.
    Running,
    /// Execution finished and a completion report was produced.
    Completed,
    /// Execution failed or the session was aborted.
    #[serde(alias = "error")]
    Errored,
}

impl SessionStatus {
    /// Whether no further transitions can occur.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }
}

/// Metrics reported by the engine's terminal result.
///
/// All fields default to zero, which is also the shape of a synthesized
/// completion when the engine never reported a result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionMetrics {
    /// Wall-clock duration of the execution.
    #[serde(default)]
    pub duration_ms: u64,
    /// Time spent waiting on the model API.
    #[serde(default)]
    pub duration_api_ms: u64,
    /// Accumulated cost in US dollars.
    #[serde(default)]
    pub total_cost_usd: f64,
    /// Number of agent turns taken.
    #[serde(default)]
    pub num_turns: u32,
}

/// One execution of the agent engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: Option<String>,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Metrics from the terminal result, zeroed until one arrives.
    pub metrics: SessionMetrics,
    /// When the start frame was accepted.
    pub created_at: DateTime<Utc>,
    /// Failure message once the session has errored.
    pub error_message: Option<String>,
}

impl Session {
    /// Construct a pending session with no identifier yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            status: SessionStatus::Pending,
            metrics: SessionMetrics::default(),
            created_at: Utc::now(),
            error_message: None,
        }
    }

    /// Durable session identifier, once the engine has reported one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Record the durable identifier.
    ///
    /// The identifier is assigned once; later calls leave it untouched and
    /// return `false`.
    pub fn assign_id(&mut self, id: impl Into<String>) -> bool {
        if self.id.is_some() {
            return false;
        }
        self.id = Some(id.into());
        true
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self.status, next),
            (
                SessionStatus::Pending,
                SessionStatus::Running | SessionStatus::Errored
            ) | (
                SessionStatus::Running,
                SessionStatus::Completed | SessionStatus::Errored
            )
        )
    }

    /// Apply a transition if permitted, returning whether it happened.
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if self.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
