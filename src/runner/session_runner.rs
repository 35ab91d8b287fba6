//! Session runner state machine.
//!
//! Drives one agent execution over a [`ControlChannel`]:
//!
//! ```text
//! Init → AwaitStart → AwaitMessage → Executing → Complete | Failed → Stopped
//! ```
//!
//! Protocol violations, early end-of-stream, and engine failures all take
//! the same error path (`process_error` plus an error completion report).
//! `process_stopped` is always the last frame written, whichever path ran.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncWrite;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::engine::{EngineEvent, ExecutionEngine, ExecutionRequest};
use crate::models::session::{Session, SessionMetrics, SessionStatus};
use crate::protocol::channel::ControlChannel;
use crate::protocol::frames::{InboundFrame, OutboundFrame, PLACEHOLDER_SESSION_ID};
use crate::runner::notifier::{CompletionNotifier, CompletionStatus};
use crate::{AppError, Result};

/// Runner states, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Channel not yet read.
    Init,
    /// Waiting for `process_start`.
    AwaitStart,
    /// Waiting for `session_message`.
    AwaitMessage,
    /// Consuming engine events.
    Executing,
    /// Completion reported.
    Complete,
    /// Error reported.
    Failed,
    /// `process_stopped` written.
    Stopped,
}

/// Settings the runner needs from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Working directory handed to the engine.
    pub workspace: PathBuf,
    /// Resume id used when `process_start` carries none.
    pub default_resume_session_id: Option<String>,
}

/// Drives one session from `process_start` to `process_stopped`.
pub struct SessionRunner {
    settings: RunnerSettings,
    engine: Arc<dyn ExecutionEngine>,
    notifier: CompletionNotifier,
    state: RunnerState,
    session: Session,
    resume_session_id: Option<String>,
}

impl SessionRunner {
    /// Create a runner in [`RunnerState::Init`].
    #[must_use]
    pub fn new(
        settings: RunnerSettings,
        engine: Arc<dyn ExecutionEngine>,
        notifier: CompletionNotifier,
    ) -> Self {
        Self {
            settings,
            engine,
            notifier,
            state: RunnerState::Init,
            session: Session::new(),
            resume_session_id: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Run the session to completion and return its final record.
    ///
    /// Never fails: every error is reported over the channel and through
    /// the completion notifier.
    pub async fn run<W>(mut self, channel: &mut ControlChannel<W>) -> Session
    where
        W: AsyncWrite + Unpin + Send,
    {
        let span = info_span!("session");
        async {
            self.state = RunnerState::AwaitStart;

            if let Err(err) = self.drive(channel).await {
                self.fail(channel, &err).await;
            }
            self.stop(channel).await;
        }
        .instrument(span)
        .await;

        self.session
    }

    async fn drive<W>(&mut self, channel: &mut ControlChannel<W>) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let frame_resume = self.await_start(channel).await?;
        self.resume_session_id = frame_resume.or_else(|| self.settings.default_resume_session_id.clone());

        let ready_id = self
            .resume_session_id
            .clone()
            .unwrap_or_else(|| PLACEHOLDER_SESSION_ID.to_owned());
        info!(session_id = ready_id.as_str(), "session runner: start accepted");
        channel
            .send(&OutboundFrame::ProcessReady {
                session_id: ready_id,
            })
            .await?;

        self.state = RunnerState::AwaitMessage;
        let prompt = self.await_message(channel).await?;

        self.state = RunnerState::Executing;
        self.session.transition(SessionStatus::Running);
        self.execute(channel, prompt).await
    }

    async fn await_start<W>(&self, channel: &ControlChannel<W>) -> Result<Option<String>>
    where
        W: AsyncWrite + Unpin,
    {
        match channel.read_frame().await? {
            Some(InboundFrame::ProcessStart { session_id }) => {
                Ok(session_id.filter(|id| !id.trim().is_empty()))
            }
            Some(other) => Err(AppError::Protocol(format!(
                "expected process_start, got {}",
                other.kind()
            ))),
            None => Err(AppError::SessionAbort(
                "control stream closed before process_start".into(),
            )),
        }
    }

    async fn await_message<W>(&self, channel: &ControlChannel<W>) -> Result<String>
    where
        W: AsyncWrite + Unpin,
    {
        match channel.read_frame().await? {
            Some(frame @ InboundFrame::SessionMessage { .. }) => frame
                .message_text()
                .ok_or_else(|| AppError::Protocol("session_message has no text".into())),
            Some(other) => Err(AppError::Protocol(format!(
                "expected session_message, got {}",
                other.kind()
            ))),
            None => Err(AppError::SessionAbort(
                "control stream closed before session_message".into(),
            )),
        }
    }

    async fn execute<W>(&mut self, channel: &mut ControlChannel<W>, prompt: String) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let request = ExecutionRequest {
            prompt,
            resume_session_id: self.resume_session_id.clone(),
            workspace: self.settings.workspace.clone(),
        };
        let mut events = self.engine.execute(request).await?;
        let mut completed = false;

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                // Once completion is reported, later failures cannot change it.
                Err(err) if completed => {
                    warn!(%err, "session runner: engine error after completion, ignoring");
                    break;
                }
                Err(err) => return Err(err),
            };

            match event {
                EngineEvent::SessionInit { session_id } => {
                    if self.session.assign_id(session_id.clone()) {
                        info!(session_id = session_id.as_str(), "session runner: session started");
                        channel
                            .send(&OutboundFrame::SessionStarted { session_id })
                            .await?;
                    } else {
                        debug!(session_id = session_id.as_str(), "session runner: repeated init ignored");
                    }
                }
                EngineEvent::Message { role, text } => {
                    debug!(?role, chars = text.len(), "session runner: engine message");
                }
                EngineEvent::Result {
                    session_id,
                    metrics,
                } => {
                    if completed {
                        warn!("session runner: duplicate result ignored");
                        continue;
                    }
                    if let Some(id) = session_id {
                        self.session.assign_id(id);
                    }
                    self.complete(channel, metrics).await?;
                    completed = true;
                }
            }
        }

        if !completed {
            warn!("session runner: engine finished without a result, synthesizing completion");
            self.complete(channel, SessionMetrics::default()).await?;
        }
        Ok(())
    }

    async fn complete<W>(
        &mut self,
        channel: &mut ControlChannel<W>,
        metrics: SessionMetrics,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.session.metrics = metrics;
        self.session.transition(SessionStatus::Completed);
        self.state = RunnerState::Complete;

        let session_id = self.reported_session_id();
        info!(
            session_id = session_id.as_str(),
            num_turns = metrics.num_turns,
            duration_ms = metrics.duration_ms,
            "session runner: session complete"
        );
        channel
            .send(&OutboundFrame::SessionComplete {
                session_id: session_id.clone(),
                result: metrics,
            })
            .await?;

        self.notifier
            .notify(CompletionStatus::Completed, Some(&session_id), None)
            .await;
        Ok(())
    }

    async fn fail<W>(&mut self, channel: &mut ControlChannel<W>, err: &AppError)
    where
        W: AsyncWrite + Unpin + Send,
    {
        error!(%err, state = ?self.state, "session runner: session failed");
        self.state = RunnerState::Failed;
        self.session.transition(SessionStatus::Errored);
        self.session.error_message = Some(err.detail().to_owned());

        if let Err(write_err) = channel
            .send(&OutboundFrame::ProcessError {
                message: err.detail().to_owned(),
            })
            .await
        {
            warn!(%write_err, "session runner: could not write process_error");
        }

        self.notifier
            .notify(CompletionStatus::Error, self.session.id(), Some(err.detail()))
            .await;
    }

    async fn stop<W>(&mut self, channel: &mut ControlChannel<W>)
    where
        W: AsyncWrite + Unpin + Send,
    {
        if let Err(err) = channel.send(&OutboundFrame::ProcessStopped).await {
            warn!(%err, "session runner: could not write process_stopped");
        }
        self.state = RunnerState::Stopped;
        debug!("session runner: stopped");
    }

    /// Id used in completion frames: the engine's id, else the resume id,
    /// else the placeholder.
    fn reported_session_id(&self) -> String {
        self.session
            .id()
            .map(str::to_owned)
            .or_else(|| self.resume_session_id.clone())
            .unwrap_or_else(|| PLACEHOLDER_SESSION_ID.to_owned())
    }
}

impl std::fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRunner")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
