//! Launching the plugin host executable

use crate::error::{WorkerError, WorkerResult};
use agent_config::{AgentConfig, ProcessConfig};
use agent_plugin_core::PluginKind;
use agent_process::{ProcessExecutor, ProcessSpec};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where the plugin host lives and how its processes are run
#[derive(Debug, Clone)]
pub struct PluginHostLauncher {
    host_path: PathBuf,
    working_directory: PathBuf,
    process: ProcessConfig,
}

impl PluginHostLauncher {
    pub fn new(
        host_path: impl Into<PathBuf>,
        working_directory: impl Into<PathBuf>,
        process: ProcessConfig,
    ) -> Self {
        Self {
            host_path: host_path.into(),
            working_directory: working_directory.into(),
            process,
        }
    }

    pub fn from_config(config: &AgentConfig) -> WorkerResult<Self> {
        let host_path = config.plugin_host.resolve_host_path()?;
        let working_directory = config.plugin_host.resolve_working_directory(&host_path);
        Ok(Self::new(host_path, working_directory, config.process.clone()))
    }

    pub fn host_path(&self) -> &Path {
        &self.host_path
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Fails with `HostNotFound` when an absolute host path does not exist
    pub fn verify(&self) -> WorkerResult<()> {
        if self.host_path.is_absolute() && !self.host_path.is_file() {
            return Err(WorkerError::HostNotFound(self.host_path.clone()));
        }
        Ok(())
    }

    /// `<host> <kind> <typeRef>` with the context as the only stdin line
    pub(crate) fn spec(
        &self,
        kind: PluginKind,
        type_ref: &str,
        context_line: String,
        environment: HashMap<String, String>,
    ) -> ProcessSpec {
        ProcessSpec::new(&self.host_path)
            .arguments(format!("{} {}", kind, type_ref))
            .working_directory(&self.working_directory)
            .envs(environment)
            .stdin_line(context_line)
    }

    pub(crate) fn executor(&self) -> ProcessExecutor {
        ProcessExecutor::new(self.process.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_missing_host() {
        let dir = tempfile::tempdir().unwrap();
        let host = dir.path().join("missing-host");
        let launcher = PluginHostLauncher::new(host, dir.path(), ProcessConfig::default());
        assert!(matches!(launcher.verify(), Err(WorkerError::HostNotFound(_))));
    }

    #[test]
    fn test_from_config_uses_explicit_paths() {
        let mut config = AgentConfig::default();
        config.plugin_host.host_path = Some(PathBuf::from("/opt/agent/bin/agent-plugin-host"));

        let launcher = PluginHostLauncher::from_config(&config).unwrap();
        assert_eq!(launcher.host_path(), Path::new("/opt/agent/bin/agent-plugin-host"));
        assert_eq!(launcher.working_directory(), Path::new("/opt/agent/bin"));
    }

    #[test]
    fn test_spec_arguments() {
        let launcher = PluginHostLauncher::new("/bin/host", "/tmp", ProcessConfig::default());
        let spec = launcher.spec(
            PluginKind::Command,
            "artifact.upload",
            "{}".to_string(),
            HashMap::new(),
        );
        assert_eq!(spec.arguments, "command artifact.upload");
        assert_eq!(spec.contents_to_standard_in, Some(vec!["{}".to_string()]));
        assert_eq!(spec.working_directory, Some(PathBuf::from("/tmp")));
    }
}
