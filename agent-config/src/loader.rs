//! Configuration loading and environment variable handling

use crate::domains::{
    logging::{LogFormat, LogLevel, LoggingConfig},
    plugin_host::PluginHostConfig,
    process::ProcessConfig,
    AgentConfig,
};
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "AGENT".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<AgentConfig> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading agent configuration");
        let content = std::fs::read_to_string(path)?;
        let mut config: AgentConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<AgentConfig> {
        let mut config = AgentConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<AgentConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut AgentConfig) -> ConfigResult<()> {
        self.apply_process_overrides(&mut config.process)?;
        self.apply_plugin_host_overrides(&mut config.plugin_host);
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_process_overrides(&self, config: &mut ProcessConfig) -> ConfigResult<()> {
        if let Some(timeout) = self.get_seconds("PROCESS_INTERRUPT_TIMEOUT")? {
            config.interrupt_timeout = timeout;
        }

        if let Some(timeout) = self.get_seconds("PROCESS_TERMINATE_TIMEOUT")? {
            config.terminate_timeout = timeout;
        }

        if let Some(timeout) = self.get_seconds("PROCESS_DRAIN_TIMEOUT")? {
            config.stream_drain_timeout = timeout;
        }

        Ok(())
    }

    fn apply_plugin_host_overrides(&self, config: &mut PluginHostConfig) {
        if let Ok(path) = self.get_env_var("PLUGIN_HOST_PATH") {
            config.host_path = Some(PathBuf::from(path));
        }

        if let Ok(dir) = self.get_env_var("PLUGIN_HOST_WORKDIR") {
            config.working_directory = Some(PathBuf::from(dir));
        }
    }

    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    fn get_seconds(&self, name: &str) -> ConfigResult<Option<Duration>> {
        match self.get_env_var(name) {
            Ok(value) => {
                let seconds: u64 = value
                    .parse()
                    .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e)))?;
                Ok(Some(Duration::from_secs(seconds)))
            }
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
