#![forbid(unsafe_code)]

//! Session relay: the stdio lifecycle protocol between an orchestrator and
//! a sandboxed agent process, and the client-side poller that reconciles
//! optimistic messages with the durable conversation log.

pub mod client;
pub mod config;
pub mod engine;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod runner;
pub mod transcript;

pub use config::{PollerConfig, RunnerConfig};
pub use errors::{AppError, Result};
