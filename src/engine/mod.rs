//! Execution engine abstraction.
//!
//! The [`ExecutionEngine`] trait decouples the session runner from the
//! concrete agent backend. An engine turns one prompt into an ordered
//! asynchronous stream of [`EngineEvent`]s; dropping the stream cancels the
//! execution.

pub mod cli_engine;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use futures_util::stream::BoxStream;

use crate::models::message::Role;
use crate::models::session::SessionMetrics;
use crate::Result;

/// Ordered event stream produced by one execution.
pub type EventStream = BoxStream<'static, Result<EngineEvent>>;

/// Events emitted by an engine while it executes.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine initialised its session and assigned a durable id.
    SessionInit {
        /// Durable session id.
        session_id: String,
    },
    /// A conversational message was produced.
    Message {
        /// Author of the message.
        role: Role,
        /// Extracted text of the message.
        text: String,
    },
    /// Terminal result of the execution.
    Result {
        /// Session id echoed by the result, if any.
        session_id: Option<String>,
        /// Execution metrics.
        metrics: SessionMetrics,
    },
}

/// Input for one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// User prompt.
    pub prompt: String,
    /// Session to resume, if any.
    pub resume_session_id: Option<String>,
    /// Working directory for the execution.
    pub workspace: PathBuf,
}

/// Backend that executes prompts.
pub trait ExecutionEngine: Send + Sync {
    /// Start an execution and return its event stream.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Execution`](crate::AppError::Execution) if the
    /// execution cannot be started.
    fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<EventStream>> + Send + '_>>;
}
