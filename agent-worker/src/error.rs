//! Worker error types

use agent_config::ConfigError;
use agent_plugin_core::{PluginError, Stage};
use agent_process::ProcessError;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No command plugin handles this `area.event`
    #[error("Logging command '{area}.{event}' is not supported")]
    NotSupported { area: String, event: String },

    #[error("Task plugin '{0}' is not registered")]
    UnknownTask(Uuid),

    #[error("Task plugin '{task}' does not run in the '{stage}' stage")]
    UnsupportedStage { task: String, stage: Stage },

    /// The command plugin exited 0 but wrote to stderr
    #[error("Command '{command}' failed: {stderr}")]
    CommandStderr { command: String, stderr: String },

    #[error("Plugin host not found at {0}")]
    HostNotFound(PathBuf),

    #[error("{failed} asynchronous command(s) failed")]
    AsyncCommandsFailed { failed: usize },
}
