//! Unit tests for runner and poller configuration.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use session_relay::config::{
    FlushConfig, ENV_CALLBACK_URL, ENV_RESUME_SESSION_ID, ENV_WORKSPACE,
};
use session_relay::engine::cli_engine::DEFAULT_AGENT_ARGS;
use session_relay::{AppError, PollerConfig, RunnerConfig};

const FULL_CONFIG: &str = r#"
workspace = "/workspace"
callback_url = "http://orchestrator:8000/sessions/abc/complete"
resume_session_id = "prev-1"
notify_timeout_seconds = 5

[agent]
program = "agent-cli"
args = ["--json"]

[flush]
program = "sync"
"#;

#[test]
fn empty_config_uses_defaults() {
    let config = RunnerConfig::from_toml_str("").expect("empty config is valid");

    assert_eq!(config, RunnerConfig::default());
    assert_eq!(config.workspace, PathBuf::from("."));
    assert_eq!(config.agent.program, "claude");
    assert_eq!(config.agent.args, DEFAULT_AGENT_ARGS);
    assert_eq!(config.notify_timeout(), Duration::from_secs(30));
    assert!(config.callback_url.is_none());
    assert!(config.flush.is_none());
}

#[test]
fn full_config_parses_every_field() {
    let config = RunnerConfig::from_toml_str(FULL_CONFIG).expect("valid config");

    assert_eq!(config.workspace, PathBuf::from("/workspace"));
    assert_eq!(
        config.callback_url.as_deref(),
        Some("http://orchestrator:8000/sessions/abc/complete")
    );
    assert_eq!(config.notify_timeout(), Duration::from_secs(5));
    assert_eq!(
        config.flush,
        Some(FlushConfig {
            program: "sync".into(),
            args: Vec::new(),
        })
    );

    let settings = config.runner_settings();
    assert_eq!(settings.workspace, PathBuf::from("/workspace"));
    assert_eq!(settings.default_resume_session_id.as_deref(), Some("prev-1"));

    let engine = config.engine_config();
    assert_eq!(engine.program, "agent-cli");
    assert_eq!(engine.args, vec!["--json".to_owned()]);
}

#[test]
fn load_from_path_reads_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(FULL_CONFIG.as_bytes()).expect("write config");

    let config = RunnerConfig::load_from_path(file.path()).expect("load config");

    assert_eq!(config.agent.program, "agent-cli");
}

#[test]
fn missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = RunnerConfig::load_from_path(dir.path().join("absent.toml")).expect_err("missing");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn invalid_toml_is_a_config_error() {
    let err = RunnerConfig::from_toml_str("workspace = [").expect_err("invalid toml");
    assert!(matches!(err, AppError::Config(ref msg) if msg.starts_with("invalid config")));
}

#[test]
fn non_http_callback_is_rejected() {
    let err = RunnerConfig::from_toml_str("callback_url = \"ftp://host/cb\"").expect_err("ftp");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("callback_url")));
}

#[test]
fn empty_agent_program_is_rejected() {
    let err = RunnerConfig::from_toml_str("[agent]\nprogram = \" \"").expect_err("empty program");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("agent.program")));
}

#[test]
fn zero_notify_timeout_is_rejected() {
    let err = RunnerConfig::from_toml_str("notify_timeout_seconds = 0").expect_err("zero");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn empty_flush_program_is_rejected() {
    let err = RunnerConfig::from_toml_str("[flush]\nprogram = \"\"").expect_err("empty flush");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("flush.program")));
}

#[test]
fn overrides_replace_file_values_and_ignore_blanks() {
    let mut config = RunnerConfig::from_toml_str(FULL_CONFIG).expect("valid config");
    let env: HashMap<&str, &str> = HashMap::from([
        (ENV_WORKSPACE, "/other"),
        (ENV_CALLBACK_URL, "  "),
        (ENV_RESUME_SESSION_ID, "prev-2"),
    ]);

    config.apply_overrides(|key| env.get(key).map(|v| (*v).to_owned()));

    assert_eq!(config.workspace, PathBuf::from("/other"));
    assert_eq!(
        config.callback_url.as_deref(),
        Some("http://orchestrator:8000/sessions/abc/complete"),
        "blank override must not clear the file value"
    );
    assert_eq!(config.resume_session_id.as_deref(), Some("prev-2"));
}

#[test]
#[serial_test::serial]
fn apply_env_reads_process_environment() {
    std::env::set_var(ENV_CALLBACK_URL, "https://orchestrator.test/cb");
    let mut config = RunnerConfig::default();

    config.apply_env();
    std::env::remove_var(ENV_CALLBACK_URL);

    assert_eq!(
        config.callback_url.as_deref(),
        Some("https://orchestrator.test/cb")
    );
    config.validate().expect("env-provided config is valid");
}

#[test]
fn poller_defaults() {
    let config = PollerConfig::default();
    assert_eq!(config.period(), Duration::from_secs(3));
    assert_eq!(config.drain_cap, 10);
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
    config.validate().expect("defaults are valid");
}

#[test]
fn zero_poll_period_is_rejected() {
    let config = PollerConfig {
        period_ms: 0,
        ..PollerConfig::default()
    };
    assert!(matches!(config.validate(), Err(AppError::Config(_))));
}
