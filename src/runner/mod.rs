//! Agent-side session orchestration.
//!
//! Covers the session lifecycle state machine and the completion notifier
//! that flushes durable state and reports terminal status.

pub mod notifier;
pub mod session_runner;
