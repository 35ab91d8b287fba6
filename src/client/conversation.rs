//! Client-side view of one conversation.

use std::sync::{Arc, Mutex, PoisonError};

use crate::models::message::{ConfirmedMessage, ConversationState, PendingMessage};
use crate::models::session::SessionStatus;

/// Confirmed state from the last successful poll plus optimistic entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    state: ConversationState,
    pending: Vec<PendingMessage>,
}

impl Conversation {
    /// An empty conversation with the given status.
    #[must_use]
    pub fn new(status: SessionStatus) -> Self {
        Self {
            state: ConversationState::empty(status),
            pending: Vec::new(),
        }
    }

    /// Record a submitted message optimistically.
    ///
    /// A submission starts a new turn, so the status becomes `Running`.
    pub fn submit(&mut self, text: impl Into<String>) -> PendingMessage {
        let pending = PendingMessage::new(text);
        self.pending.push(pending.clone());
        self.state.status = SessionStatus::Running;
        pending
    }

    /// Replace the confirmed state wholesale.
    pub fn replace_state(&mut self, state: ConversationState) {
        self.state = state;
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    /// Confirmed sequence from the last successful poll.
    #[must_use]
    pub fn messages(&self) -> &[ConfirmedMessage] {
        &self.state.messages
    }

    /// Failure text reported with an errored status.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.state.error_message.as_deref()
    }

    /// Optimistic entries not yet confirmed.
    #[must_use]
    pub fn pending(&self) -> &[PendingMessage] {
        &self.pending
    }

    pub(crate) fn pending_mut(&mut self) -> &mut Vec<PendingMessage> {
        &mut self.pending
    }
}

/// Conversation shared between the poller and its readers.
///
/// The lock is only held for short synchronous updates, never across an
/// await.
pub type SharedConversation = Arc<Mutex<Conversation>>;

/// Wrap a conversation for sharing with a poller.
#[must_use]
pub fn shared(conversation: Conversation) -> SharedConversation {
    Arc::new(Mutex::new(conversation))
}

/// Run `f` with the conversation locked.
pub fn with_conversation<T>(
    conversation: &SharedConversation,
    f: impl FnOnce(&mut Conversation) -> T,
) -> T {
    let mut guard = conversation.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}
