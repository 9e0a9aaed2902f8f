//! Domain-specific configuration modules

pub mod logging;
pub mod plugin_host;
pub mod process;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Agent configuration combining all domains
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// External process execution
    pub process: process::ProcessConfig,

    /// Plugin host launcher
    pub plugin_host: plugin_host::PluginHostConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,
}

impl AgentConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.process.validate()?;
        self.plugin_host.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Render the configuration as YAML
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
