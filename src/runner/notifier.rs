//! Completion notifier.
//!
//! Reports a session's terminal state to the orchestrator in two ordered
//! steps:
//!
//! 1. **Flush** durable state through a [`Flusher`]. A failed flush is
//!    logged and the report still goes out.
//! 2. **Deliver** one [`CompletionReport`] through a [`CompletionSink`].
//!    Delivery is best-effort: one attempt, failures logged, no retry.
//!
//! A notifier reports at most once; later calls are ignored.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{AppError, Result};

/// Terminal status carried by a completion report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// The session finished.
    Completed,
    /// The session failed.
    Error,
}

/// Body of the completion callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    /// Terminal status.
    pub status: CompletionStatus,
    /// Durable session id, when one was assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Failure message for error reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// ── Flush ─────────────────────────────────────────────────────────────────────

/// Makes session results durable before they are announced.
pub trait Flusher: Send + Sync {
    /// Flush durable state.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Flush`] if the flush fails.
    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Flusher for deployments with nothing to flush.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFlusher;

impl Flusher for NoopFlusher {
    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

/// Runs an external command (e.g. `sync`) to flush the workspace volume.
#[derive(Debug, Clone)]
pub struct CommandFlusher {
    program: String,
    args: Vec<String>,
    workdir: PathBuf,
}

impl CommandFlusher {
    /// Create a flusher running `program args...` inside `workdir`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, workdir: PathBuf) -> Self {
        Self {
            program: program.into(),
            args,
            workdir,
        }
    }

    async fn run(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.workdir)
            .status()
            .await
            .map_err(|e| AppError::Flush(format!("failed to run `{}`: {e}", self.program)))?;

        if status.success() {
            Ok(())
        } else {
            Err(AppError::Flush(format!(
                "`{}` exited with {status}",
                self.program
            )))
        }
    }
}

impl Flusher for CommandFlusher {
    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.run())
    }
}

// ── Delivery ──────────────────────────────────────────────────────────────────

/// Single outbound call announcing a terminal session.
pub trait CompletionSink: Send + Sync {
    /// Deliver the report once.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Notify`] if delivery fails.
    fn deliver<'a>(
        &'a self,
        report: &'a CompletionReport,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Posts the report as JSON to the orchestrator's callback URL.
#[derive(Debug, Clone)]
pub struct HttpCallback {
    client: reqwest::Client,
    url: String,
}

impl HttpCallback {
    /// Build a callback client with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn post(&self, report: &CompletionReport) -> Result<()> {
        self.client
            .post(&self.url)
            .json(report)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AppError::Notify(format!("callback to {} failed: {e}", self.url)))?;
        Ok(())
    }
}

impl CompletionSink for HttpCallback {
    fn deliver<'a>(
        &'a self,
        report: &'a CompletionReport,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.post(report))
    }
}

// ── Notifier ──────────────────────────────────────────────────────────────────

/// Flushes and reports a session's terminal state, at most once.
pub struct CompletionNotifier {
    flusher: Box<dyn Flusher>,
    sink: Option<Box<dyn CompletionSink>>,
    notified: AtomicBool,
}

impl CompletionNotifier {
    /// Create a notifier. With no sink, reports are only logged.
    #[must_use]
    pub fn new(flusher: Box<dyn Flusher>, sink: Option<Box<dyn CompletionSink>>) -> Self {
        Self {
            flusher,
            sink,
            notified: AtomicBool::new(false),
        }
    }

    /// Whether a report has already been attempted.
    #[must_use]
    pub fn has_notified(&self) -> bool {
        self.notified.load(Ordering::SeqCst)
    }

    /// Flush, then deliver one completion report.
    ///
    /// Never fails: flush and delivery errors are logged and swallowed.
    /// Calls after the first are ignored.
    pub async fn notify(
        &self,
        status: CompletionStatus,
        session_id: Option<&str>,
        error_message: Option<&str>,
    ) {
        if self.notified.swap(true, Ordering::SeqCst) {
            warn!(?status, "completion notifier: already notified, ignoring");
            return;
        }

        if let Err(err) = self.flusher.flush().await {
            warn!(%err, "completion notifier: flush failed, reporting anyway");
        } else {
            debug!("completion notifier: durable state flushed");
        }

        let report = CompletionReport {
            status,
            session_id: session_id.map(str::to_owned),
            error_message: error_message.map(str::to_owned),
        };

        let Some(sink) = &self.sink else {
            debug!(?status, "completion notifier: no callback configured");
            return;
        };

        match sink.deliver(&report).await {
            Ok(()) => info!(?status, session_id, "completion notifier: report delivered"),
            Err(err) => warn!(%err, ?status, "completion notifier: report not delivered"),
        }
    }
}

impl std::fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("has_sink", &self.sink.is_some())
            .field("notified", &self.has_notified())
            .finish_non_exhaustive()
    }
}
