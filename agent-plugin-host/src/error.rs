//! Host failures that are not the plugin's fault

use agent_plugin_core::PluginError;
use thiserror::Error;

/// Failures before a plugin could be invoked; the host exits non-zero
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// The single JSON line written to stderr for an infrastructure failure
pub fn infrastructure_report(message: &str) -> String {
    serde_json::json!({
        "error": "infrastructure",
        "message": message,
    })
    .to_string()
}
