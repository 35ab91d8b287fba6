#![forbid(unsafe_code)]

//! `session-watch`: terminal companion that follows a conversation.
//!
//! Polls the orchestrator's read endpoint, prints newly confirmed messages
//! whenever the refresh signal fires, and exits once the conversation has
//! settled (or the drain tail runs out). A failed stdout write, such as a
//! closed pipe, stops the poller and ends the process with an I/O error.

use std::io::Write;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use session_relay::client::conversation::{self, with_conversation, Conversation};
use session_relay::client::poller::{Poller, StopReason};
use session_relay::client::source::HttpConversationSource;
use session_relay::models::message::Role;
use session_relay::models::session::SessionStatus;
use session_relay::{AppError, PollerConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "session-watch",
    about = "Follow a sandboxed agent conversation",
    version,
    long_about = None
)]
struct Cli {
    /// Orchestrator base URL (e.g. `http://localhost:8000`).
    #[arg(long)]
    base_url: String,

    /// Conversation identifier.
    conversation_id: String,

    /// Poll period in milliseconds.
    #[arg(long, default_value_t = 3000)]
    period_ms: u64,

    /// Extra polls allowed after the conversation finishes.
    #[arg(long, default_value_t = 10)]
    drain_cap: u32,

    /// Message just submitted elsewhere; tracked until it is confirmed.
    #[arg(long)]
    expect: Vec<String>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = PollerConfig {
        period_ms: args.period_ms,
        drain_cap: args.drain_cap,
        ..PollerConfig::default()
    };
    config.validate()?;

    let source = HttpConversationSource::new(
        &args.base_url,
        &args.conversation_id,
        config.request_timeout(),
    )?;
    info!(url = source.url(), "session-watch: following conversation");

    let mut initial = Conversation::new(SessionStatus::Pending);
    for text in &args.expect {
        initial.submit(text.clone());
    }
    let shared = conversation::shared(initial);

    let (refresh_tx, mut refresh_rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let poller = Poller::new(Arc::new(source), Arc::clone(&shared), &config)
        .with_refresh_signal(refresh_tx);
    let handle = poller.spawn(cancel.clone());

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let mut printed = 0usize;
    while refresh_rx.recv().await.is_some() {
        match print_new_messages(&mut std::io::stdout().lock(), &shared, printed) {
            Ok(total) => printed = total,
            Err(err) => {
                cancel.cancel();
                return Err(err);
            }
        }
    }

    let summary = handle
        .await
        .map_err(|err| AppError::Io(format!("poller task failed: {err}")))?;
    print_new_messages(&mut std::io::stdout().lock(), &shared, printed)?;

    let (status, error) = with_conversation(&shared, |c| {
        (c.status(), c.error_message().map(str::to_owned))
    });
    match (summary.stop, status) {
        (StopReason::DrainExhausted, _) => warn!(
            unconfirmed = summary.abandoned.len(),
            "session-watch: gave up waiting for submitted messages"
        ),
        (_, SessionStatus::Errored) => warn!(
            error = error.as_deref().unwrap_or("unknown"),
            "session-watch: conversation errored"
        ),
        _ => info!(?status, requests = summary.requests, "session-watch: done"),
    }

    Ok(())
}

/// Print confirmed messages past `already_printed`; returns the new count.
///
/// The confirmed sequence is replaced wholesale per poll, so a shorter
/// sequence restarts printing from its end.
///
/// # Errors
///
/// Returns [`AppError::Io`] if writing to `out` fails.
fn print_new_messages(
    out: &mut impl Write,
    shared: &conversation::SharedConversation,
    already_printed: usize,
) -> Result<usize> {
    let (lines, total): (Vec<String>, usize) = with_conversation(shared, |c| {
        let lines = c
            .messages()
            .iter()
            .skip(already_printed)
            .map(|m| {
                let who = match m.role {
                    Role::User => "you",
                    Role::Assistant => "agent",
                    Role::System => "system",
                };
                format!("[{who}] {}", m.text())
            })
            .collect();
        (lines, c.messages().len())
    });

    for line in &lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(total)
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
