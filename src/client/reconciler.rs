//! Reconciliation of fetched state with optimistic client entries.
//!
//! Two decisions are made per poll:
//!
//! - **Retirement**: a pending entry is retired when the freshly fetched
//!   sequence holds a `user` message whose extracted text equals the
//!   pending text exactly. Nothing is retired speculatively.
//! - **Refresh gating**: the secondary refresh signal fires only when
//!   `(status, confirmed count)` differs from the previous poll. The
//!   snapshot is updated on every poll.

use crate::client::conversation::Conversation;
use crate::models::message::{ConfirmedMessage, ConversationState, PendingMessage, Role};
use crate::models::session::SessionStatus;

/// `(status, confirmed count)` memo of the previous poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSnapshot {
    /// Status seen by the poll.
    pub status: SessionStatus,
    /// Number of confirmed messages seen by the poll.
    pub confirmed_count: usize,
}

/// Result of reconciling one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Pending entries retired by this poll.
    pub retired: Vec<PendingMessage>,
    /// Whether dependent subsystems should refresh.
    pub refresh: bool,
}

/// Stateful reconciler owning the previous-poll snapshot.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    previous: Option<PollSnapshot>,
}

impl Reconciler {
    /// Reconciler with no previous snapshot; the first poll always signals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciler seeded with the state the client already shows.
    #[must_use]
    pub fn seeded(snapshot: PollSnapshot) -> Self {
        Self {
            previous: Some(snapshot),
        }
    }

    /// Snapshot from the most recent poll.
    #[must_use]
    pub fn previous(&self) -> Option<PollSnapshot> {
        self.previous
    }

    /// Compare against the previous snapshot, then record the new one.
    pub fn should_refresh(&mut self, snapshot: PollSnapshot) -> bool {
        let changed = self.previous != Some(snapshot);
        self.previous = Some(snapshot);
        changed
    }

    /// Apply one fetched state to `conversation`.
    ///
    /// The confirmed sequence is replaced wholesale, matching pending
    /// entries are retired, and the refresh decision is made.
    pub fn reconcile(
        &mut self,
        conversation: &mut Conversation,
        state: ConversationState,
    ) -> ReconcileOutcome {
        let snapshot = PollSnapshot {
            status: state.status,
            confirmed_count: state.messages.len(),
        };

        let retired = retire_confirmed(conversation.pending_mut(), &state.messages);
        conversation.replace_state(state);
        let refresh = self.should_refresh(snapshot);

        ReconcileOutcome { retired, refresh }
    }
}

/// Remove every pending entry matched by a confirmed `user` message and
/// return the removed entries in their original order.
pub fn retire_confirmed(
    pending: &mut Vec<PendingMessage>,
    confirmed: &[ConfirmedMessage],
) -> Vec<PendingMessage> {
    if pending.is_empty() {
        return Vec::new();
    }

    let user_texts: Vec<String> = confirmed
        .iter()
        .filter(|message| message.role == Role::User)
        .map(ConfirmedMessage::text)
        .collect();

    let (retired, kept): (Vec<_>, Vec<_>) = pending
        .drain(..)
        .partition(|entry| user_texts.iter().any(|text| *text == entry.text));
    *pending = kept;
    retired
}
