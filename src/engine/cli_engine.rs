//! Agent CLI execution engine.
//!
//! Spawns a headless agent CLI that prints its progress as
//! newline-delimited JSON (`--output-format stream-json`) and maps each line
//! to an [`EngineEvent`]:
//!
//! | `type`                      | Maps to                       |
//! |-----------------------------|-------------------------------|
//! | `system` (`subtype: init`)  | [`EngineEvent::SessionInit`]  |
//! | `assistant` / `user`        | [`EngineEvent::Message`]      |
//! | `result`                    | [`EngineEvent::Result`]       |
//! | *(any other)*               | Skipped; logged at `DEBUG`    |
//!
//! The prompt is written to the child's stdin, which is then closed. Stdout
//! is drained to EOF even past over-long lines, so the child never blocks on
//! a full pipe. The child is spawned with `kill_on_drop(true)`, so dropping
//! the event stream terminates the process.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use futures_util::{stream, StreamExt};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::engine::{EngineEvent, EventStream, ExecutionEngine, ExecutionRequest};
use crate::models::message::{MessageContent, Role};
use crate::models::session::SessionMetrics;
use crate::protocol::codec::FrameCodec;
use crate::{AppError, Result};

/// Arguments passed before the optional `--resume` flag.
pub const DEFAULT_AGENT_ARGS: &[&str] = &["-p", "--output-format", "stream-json", "--verbose"];

/// Configuration for spawning the agent CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliEngineConfig {
    /// Agent CLI binary (e.g. `claude`).
    pub program: String,
    /// Arguments passed on every invocation.
    pub args: Vec<String>,
}

impl Default for CliEngineConfig {
    fn default() -> Self {
        Self {
            program: "claude".into(),
            args: DEFAULT_AGENT_ARGS.iter().map(|&a| a.to_owned()).collect(),
        }
    }
}

/// [`ExecutionEngine`] backed by an agent CLI child process.
#[derive(Debug, Clone)]
pub struct CliEngine {
    config: CliEngineConfig,
}

impl CliEngine {
    /// Create an engine that spawns `config.program`.
    #[must_use]
    pub fn new(config: CliEngineConfig) -> Self {
        Self { config }
    }

    fn command(&self, request: &ExecutionRequest) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args);
        if let Some(resume) = &request.resume_session_id {
            cmd.arg("--resume").arg(resume);
        }
        cmd.current_dir(&request.workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }

    async fn start(&self, request: ExecutionRequest) -> Result<EventStream> {
        let mut child = self.command(&request).spawn().map_err(|e| {
            AppError::Execution(format!(
                "failed to spawn agent `{}`: {e}",
                self.config.program
            ))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Execution("agent stdin not captured".into()))?;
        stdin
            .write_all(request.prompt.as_bytes())
            .await
            .map_err(|e| AppError::Execution(format!("failed to send prompt to agent: {e}")))?;
        // Closing stdin marks the end of the prompt.
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Execution("agent stdout not captured".into()))?;

        info!(
            program = self.config.program.as_str(),
            workspace = %request.workspace.display(),
            resume = request.resume_session_id.as_deref().unwrap_or(""),
            "cli engine: agent spawned"
        );

        let state = CliStream {
            lines: FramedRead::new(stdout, FrameCodec::new()),
            child,
            finished: false,
        };
        Ok(stream::unfold(state, next_event).boxed())
    }
}

impl ExecutionEngine for CliEngine {
    fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<EventStream>> + Send + '_>> {
        Box::pin(self.start(request))
    }
}

// ── Stream state ──────────────────────────────────────────────────────────────

struct CliStream {
    lines: FramedRead<ChildStdout, FrameCodec>,
    child: Child,
    finished: bool,
}

async fn next_event(mut state: CliStream) -> Option<(Result<EngineEvent>, CliStream)> {
    if state.finished {
        return None;
    }

    loop {
        match state.lines.next().await {
            Some(Ok(Ok(line))) => match parse_engine_line(&line) {
                Ok(Some(event)) => return Some((Ok(event), state)),
                Ok(None) => {}
                Err(e) => warn!(error = %e, raw_line = %line, "cli engine: unparseable line, skipping"),
            },
            // The codec has already discarded the line; keep draining stdout.
            Some(Ok(Err(e))) => warn!(error = %e, "cli engine: over-long line, skipping"),
            Some(Err(e)) => {
                state.finished = true;
                return Some((
                    Err(AppError::Execution(format!("agent stream error: {e}"))),
                    state,
                ));
            }
            None => {
                state.finished = true;
                return match state.child.wait().await {
                    Ok(status) if status.success() => {
                        debug!("cli engine: agent exited cleanly");
                        None
                    }
                    Ok(status) => Some((
                        Err(AppError::Execution(format!("agent exited with {status}"))),
                        state,
                    )),
                    Err(e) => Some((
                        Err(AppError::Execution(format!("failed to reap agent: {e}"))),
                        state,
                    )),
                };
            }
        }
    }
}

// ── Line parsing ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamLine {
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },
    Assistant {
        message: StreamMessage,
    },
    User {
        message: StreamMessage,
    },
    Result {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(flatten)]
        metrics: SessionMetrics,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    content: MessageContent,
}

/// Parse one stream-json line from the agent CLI.
///
/// # Return value
///
/// - `Ok(Some(event))` for recognised lines.
/// - `Ok(None)` for blank lines, unknown types, non-init system lines, and
///   messages without text.
///
/// # Errors
///
/// Returns [`AppError::Protocol`] if the line is not valid JSON or a known
/// type is missing required fields.
pub fn parse_engine_line(line: &str) -> Result<Option<EngineEvent>> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let parsed: StreamLine = serde_json::from_str(line)
        .map_err(|e| AppError::Protocol(format!("malformed engine line: {e}")))?;

    let event = match parsed {
        StreamLine::System {
            subtype,
            session_id: Some(session_id),
        } if subtype.as_deref() == Some("init") => Some(EngineEvent::SessionInit { session_id }),
        StreamLine::System { .. } => None,
        StreamLine::Other => {
            debug!("cli engine: skipping unknown line type");
            None
        }
        StreamLine::Assistant { message } => message_event(Role::Assistant, &message),
        StreamLine::User { message } => message_event(Role::User, &message),
        StreamLine::Result {
            session_id,
            metrics,
        } => Some(EngineEvent::Result {
            session_id,
            metrics,
        }),
    };

    Ok(event)
}

fn message_event(role: Role, message: &StreamMessage) -> Option<EngineEvent> {
    let text = message.content.extract_text();
    if text.is_empty() {
        None
    } else {
        Some(EngineEvent::Message { role, text })
    }
}
