//! Runner and poller configuration parsing, overrides, and validation.
//!
//! Runner settings come from an optional TOML file, then environment
//! variables, then command-line flags, and are validated once at the end.
//! Nothing reads the environment after startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::cli_engine::{CliEngineConfig, DEFAULT_AGENT_ARGS};
use crate::runner::session_runner::RunnerSettings;
use crate::{AppError, Result};

/// Workspace directory override.
pub const ENV_WORKSPACE: &str = "RELAY_WORKSPACE";
/// Completion callback URL override.
pub const ENV_CALLBACK_URL: &str = "RELAY_CALLBACK_URL";
/// Default resume session id override.
pub const ENV_RESUME_SESSION_ID: &str = "RELAY_RESUME_SESSION_ID";

/// Agent CLI invocation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Agent CLI binary.
    #[serde(default = "default_agent_program")]
    pub program: String,
    /// Arguments passed on every invocation.
    #[serde(default = "default_agent_args")]
    pub args: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: default_agent_program(),
            args: default_agent_args(),
        }
    }
}

fn default_agent_program() -> String {
    "claude".into()
}

fn default_agent_args() -> Vec<String> {
    DEFAULT_AGENT_ARGS.iter().map(|&a| a.to_owned()).collect()
}

/// Command run to flush durable state before the completion report.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct FlushConfig {
    /// Flush binary (e.g. `sync`).
    pub program: String,
    /// Flush arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_notify_timeout_seconds() -> u64 {
    30
}

/// Configuration for the `session-runner` binary.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    /// Working directory for the agent.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
    /// Orchestrator URL receiving the completion report.
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Session resumed when `process_start` names none.
    #[serde(default)]
    pub resume_session_id: Option<String>,
    /// Completion callback timeout.
    #[serde(default = "default_notify_timeout_seconds")]
    pub notify_timeout_seconds: u64,
    /// Agent CLI invocation.
    #[serde(default)]
    pub agent: AgentConfig,
    /// Optional flush command.
    #[serde(default)]
    pub flush: Option<FlushConfig>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            callback_url: None,
            resume_session_id: None,
            notify_timeout_seconds: default_notify_timeout_seconds(),
            agent: AgentConfig::default(),
            flush: None,
        }
    }
}

impl RunnerConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(workspace) = get(ENV_WORKSPACE) {
            self.workspace = PathBuf::from(workspace);
        }
        if let Some(url) = get(ENV_CALLBACK_URL) {
            self.callback_url = Some(url);
        }
        if let Some(resume) = get(ENV_RESUME_SESSION_ID) {
            self.resume_session_id = Some(resume);
        }
    }

    /// Check invariants.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.agent.program.trim().is_empty() {
            return Err(AppError::Config("agent.program must not be empty".into()));
        }

        if let Some(url) = &self.callback_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::Config(format!(
                    "callback_url must be an http(s) URL, got {url}"
                )));
            }
        }

        if self.notify_timeout_seconds == 0 {
            return Err(AppError::Config(
                "notify_timeout_seconds must be greater than zero".into(),
            ));
        }

        if let Some(flush) = &self.flush {
            if flush.program.trim().is_empty() {
                return Err(AppError::Config("flush.program must not be empty".into()));
            }
        }

        Ok(())
    }

    /// Completion callback timeout.
    #[must_use]
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_seconds)
    }

    /// Settings consumed by the session runner.
    #[must_use]
    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            workspace: self.workspace.clone(),
            default_resume_session_id: self.resume_session_id.clone(),
        }
    }

    /// Engine configuration for the agent CLI.
    #[must_use]
    pub fn engine_config(&self) -> CliEngineConfig {
        CliEngineConfig {
            program: self.agent.program.clone(),
            args: self.agent.args.clone(),
        }
    }
}

fn default_period_ms() -> u64 {
    3000
}

fn default_drain_cap() -> u32 {
    10
}

fn default_request_timeout_seconds() -> u64 {
    30
}

/// Poll loop tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PollerConfig {
    /// Timer period between ticks.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Requests allowed after the conversation turns terminal.
    #[serde(default = "default_drain_cap")]
    pub drain_cap: u32,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            drain_cap: default_drain_cap(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl PollerConfig {
    /// Timer period.
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Check invariants.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the period or timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.period_ms == 0 {
            return Err(AppError::Config("period_ms must be greater than zero".into()));
        }
        if self.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "request_timeout_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
