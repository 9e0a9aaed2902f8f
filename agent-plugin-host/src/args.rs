//! Command line of the plugin host

use clap::Parser;

/// Environment variable enabling host diagnostics when `--log-level` is absent
pub const LOG_LEVEL_ENV: &str = "AGENT_PLUGIN_HOST_LOG";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "agent-plugin-host",
    author,
    version,
    about = "Runs one agent plugin against an execution context read from stdin",
    long_about = None
)]
pub struct HostArgs {
    /// Plugin kind (task or command)
    pub kind: String,

    /// Task GUID or command `area.event`
    pub type_ref: String,

    /// Write host diagnostics to stderr at this level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl HostArgs {
    pub fn new(kind: impl Into<String>, type_ref: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            type_ref: type_ref.into(),
            log_level: None,
        }
    }

    /// Explicit level, falling back to the environment
    pub fn effective_log_level(&self) -> Option<String> {
        self.log_level
            .clone()
            .or_else(|| std::env::var(LOG_LEVEL_ENV).ok())
            .filter(|level| !level.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positionals() {
        let args = HostArgs::try_parse_from(["agent-plugin-host", "command", "artifact.upload"])
            .unwrap();
        assert_eq!(args.kind, "command");
        assert_eq!(args.type_ref, "artifact.upload");
        assert!(args.log_level.is_none());
    }

    #[test]
    fn test_wrong_arity_is_an_error() {
        assert!(HostArgs::try_parse_from(["agent-plugin-host", "task"]).is_err());
        assert!(HostArgs::try_parse_from(["agent-plugin-host", "task", "a", "b"]).is_err());
    }

    #[test]
    fn test_log_level_flag() {
        let args = HostArgs::try_parse_from([
            "agent-plugin-host",
            "task",
            "c61807ba-5e20-4b70-bd8c-3683c9f74003",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.effective_log_level().as_deref(), Some("debug"));
    }
}
