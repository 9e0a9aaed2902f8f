//! Process execution configuration

use crate::domains::utils::serde_duration;
use crate::error::ConfigResult;
use crate::validation::{validate_env_var_name, validate_timeout, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts and environment used when running external processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// How long to wait for exit after sending an interrupt (SIGINT / Ctrl+C)
    #[serde(with = "serde_duration", default = "default_interrupt_timeout")]
    pub interrupt_timeout: Duration,

    /// How long to wait for exit after sending a terminate (SIGTERM / Ctrl+Break)
    #[serde(with = "serde_duration", default = "default_terminate_timeout")]
    pub terminate_timeout: Duration,

    /// How long to keep reading output after the process exited
    #[serde(with = "serde_duration", default = "default_stream_drain_timeout")]
    pub stream_drain_timeout: Duration,

    /// Name of the variable marking a process as running under the agent
    #[serde(default = "default_build_marker_variable")]
    pub build_marker_variable: String,

    /// Value of the marker variable
    #[serde(default = "default_build_marker_value")]
    pub build_marker_value: String,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            interrupt_timeout: default_interrupt_timeout(),
            terminate_timeout: default_terminate_timeout(),
            stream_drain_timeout: default_stream_drain_timeout(),
            build_marker_variable: default_build_marker_variable(),
            build_marker_value: default_build_marker_value(),
        }
    }
}

impl Validatable for ProcessConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_timeout(self.interrupt_timeout, "interrupt_timeout", self.domain_name())?;
        validate_timeout(self.terminate_timeout, "terminate_timeout", self.domain_name())?;
        validate_timeout(
            self.stream_drain_timeout,
            "stream_drain_timeout",
            self.domain_name(),
        )?;
        validate_env_var_name(
            &self.build_marker_variable,
            "build_marker_variable",
            self.domain_name(),
        )?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "process"
    }
}

fn default_interrupt_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_terminate_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_stream_drain_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_build_marker_variable() -> String {
    "TFSBUILD".to_string()
}

fn default_build_marker_value() -> String {
    "True".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_config_defaults() {
        let config = ProcessConfig::default();
        assert_eq!(config.interrupt_timeout, Duration::from_secs(10));
        assert_eq!(config.terminate_timeout, Duration::from_secs(5));
        assert_eq!(config.stream_drain_timeout, Duration::from_secs(5));
        assert_eq!(config.build_marker_variable, "TFSBUILD");
        assert_eq!(config.build_marker_value, "True");
    }

    #[test]
    fn test_process_config_validation() {
        let mut config = ProcessConfig::default();
        assert!(config.validate().is_ok());

        config.terminate_timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: ProcessConfig = serde_yaml::from_str("interrupt_timeout: 3").unwrap();
        assert_eq!(config.interrupt_timeout, Duration::from_secs(3));
        assert_eq!(config.terminate_timeout, Duration::from_secs(5));
    }
}
