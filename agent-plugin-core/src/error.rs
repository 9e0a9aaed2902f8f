//! Plugin error types

use thiserror::Error;

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

/// Plugin system errors
#[derive(Error, Debug)]
pub enum PluginError {
    /// Plugin failed while running; reported in-band by the host
    #[error("Plugin '{name}' execution error: {reason}")]
    ExecutionError { name: String, reason: String },

    #[error("Required input '{0}' was not supplied")]
    MissingInput(String),

    #[error("Repository '{0}' was not found in the execution context")]
    RepositoryNotFound(String),

    #[error("Unknown plugin type reference '{0}'")]
    UnknownTypeRef(String),

    #[error("Plugin '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Unsupported plugin kind '{0}'")]
    UnsupportedKind(String),

    #[error("No execution context was supplied")]
    MissingContext,

    #[error("Invalid execution context: {0}")]
    InvalidContext(String),

    #[error("Plugin operation was cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PluginError {
    /// Create an execution error
    pub fn execution_error(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionError {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
