//! Plugin host launcher configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default file name of the plugin host executable
pub const DEFAULT_HOST_EXECUTABLE: &str = "agent-plugin-host";

/// Where to find the plugin host and where to run it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginHostConfig {
    /// Explicit path of the plugin host executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_path: Option<PathBuf>,

    /// Working directory for plugin host processes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

impl PluginHostConfig {
    /// Resolve the host executable, falling back to a sibling of the current binary
    pub fn resolve_host_path(&self) -> ConfigResult<PathBuf> {
        if let Some(path) = &self.host_path {
            return Ok(path.clone());
        }

        let current = std::env::current_exe()?;
        let dir = current
            .parent()
            .ok_or_else(|| self.validation_error("current executable has no parent directory"))?;
        Ok(dir.join(format!("{}{}", DEFAULT_HOST_EXECUTABLE, std::env::consts::EXE_SUFFIX)))
    }

    /// Resolve the working directory, defaulting to the host's directory
    pub fn resolve_working_directory(&self, host_path: &std::path::Path) -> PathBuf {
        match &self.working_directory {
            Some(dir) => dir.clone(),
            None => host_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl Validatable for PluginHostConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(path) = &self.host_path {
            validate_required_string(&path.to_string_lossy(), "host_path", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "plugin_host"
    }
}
