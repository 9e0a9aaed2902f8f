//! Domain-driven configuration for the build agent
//!
//! Configuration is split by functional domain (process execution, plugin
//! host, logging), loaded from YAML with `AGENT_*` environment overrides.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

pub use domains::{
    logging::{LogFormat, LogLevel, LoggingConfig},
    plugin_host::{PluginHostConfig, DEFAULT_HOST_EXECUTABLE},
    process::ProcessConfig,
    AgentConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
