//! Front-end observation of a conversation.
//!
//! Covers the conversation source seam, the client-side conversation
//! view, the poll loop, and reconciliation of optimistic entries.

pub mod conversation;
pub mod poller;
pub mod reconciler;
pub mod source;
