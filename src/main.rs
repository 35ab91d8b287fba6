#![forbid(unsafe_code)]

//! `session-runner`: agent-side process speaking the control protocol.
//!
//! Reads control frames from stdin, drives the agent CLI, writes frames to
//! stdout, and reports completion to the orchestrator. Logs go to stderr
//! because stdout carries the protocol.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use session_relay::engine::cli_engine::CliEngine;
use session_relay::models::session::SessionStatus;
use session_relay::protocol::channel::ControlChannel;
use session_relay::runner::notifier::{
    CommandFlusher, CompletionNotifier, CompletionSink, Flusher, HttpCallback, NoopFlusher,
};
use session_relay::runner::session_runner::SessionRunner;
use session_relay::{AppError, Result, RunnerConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "session-runner", about = "Sandboxed agent session runner", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the agent workspace directory.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Override the completion callback URL.
    #[arg(long)]
    callback_url: Option<String>,

    /// Session to resume when `process_start` names none.
    #[arg(long)]
    resume: Option<String>,
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<ExitCode> {
    let config = load_config(&args)?;
    info!(
        workspace = %config.workspace.display(),
        callback = config.callback_url.as_deref().unwrap_or(""),
        "session-runner bootstrap"
    );

    let flusher: Box<dyn Flusher> = match &config.flush {
        Some(flush) => Box::new(CommandFlusher::new(
            flush.program.clone(),
            flush.args.clone(),
            config.workspace.clone(),
        )),
        None => Box::new(NoopFlusher),
    };
    let sink: Option<Box<dyn CompletionSink>> = match &config.callback_url {
        Some(url) => Some(Box::new(HttpCallback::new(url.clone(), config.notify_timeout())?)),
        None => None,
    };

    let runner = SessionRunner::new(
        config.runner_settings(),
        Arc::new(CliEngine::new(config.engine_config())),
        CompletionNotifier::new(flusher, sink),
    );

    let mut channel = ControlChannel::open(tokio::io::stdin(), tokio::io::stdout());
    let session = runner.run(&mut channel).await;

    info!(
        session_id = session.id().unwrap_or(""),
        status = ?session.status,
        "session-runner finished"
    );

    Ok(if session.status == SessionStatus::Errored {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn load_config(args: &Cli) -> Result<RunnerConfig> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load_from_path(path)?,
        None => RunnerConfig::default(),
    };
    config.apply_env();

    if let Some(workspace) = &args.workspace {
        config.workspace.clone_from(workspace);
    }
    if let Some(url) = &args.callback_url {
        config.callback_url = Some(url.clone());
    }
    if let Some(resume) = &args.resume {
        config.resume_session_id = Some(resume.clone());
    }

    config.validate()?;
    Ok(config)
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
