//! Error types for process execution

use thiserror::Error;

/// Process execution errors
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The process exited non-zero while a zero exit code was required
    #[error("Process exited with code {exit_code}: {program} {arguments}")]
    ExitCode {
        exit_code: i32,
        program: String,
        arguments: String,
    },

    /// The run was cancelled; all output produced before termination was delivered
    #[error("Process execution was cancelled")]
    Cancelled,

    /// An executor runs exactly one process
    #[error("Process executor has already started a process")]
    AlreadyStarted,

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid process arguments: {0}")]
    InvalidArguments(String),

    #[error("IO error while waiting for process: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    /// Exit code carried by an `ExitCode` error
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::ExitCode { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProcessError::Cancelled)
    }
}
