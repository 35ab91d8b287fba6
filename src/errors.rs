//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Malformed or unexpected control frame.
    Protocol(String),
    /// A required frame never arrived because the control stream closed.
    SessionAbort(String),
    /// The execution engine failed while a session was executing.
    Execution(String),
    /// Durable-storage flush failed before the completion report.
    Flush(String),
    /// Completion report could not be delivered to the orchestrator.
    Notify(String),
    /// Conversation state could not be fetched from the orchestrator.
    Fetch(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// The bare failure message without the category prefix.
    ///
    /// This is the text surfaced in `process_error` frames and error
    /// completion reports.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Config(msg)
            | Self::Protocol(msg)
            | Self::SessionAbort(msg)
            | Self::Execution(msg)
            | Self::Flush(msg)
            | Self::Notify(msg)
            | Self::Fetch(msg)
            | Self::Io(msg) => msg,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::SessionAbort(msg) => write!(f, "session aborted: {msg}"),
            Self::Execution(msg) => write!(f, "execution: {msg}"),
            Self::Flush(msg) => write!(f, "flush: {msg}"),
            Self::Notify(msg) => write!(f, "notify: {msg}"),
            Self::Fetch(msg) => write!(f, "fetch: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
