//! Parent-side handling of a task plugin's output

use crate::job::JobContext;
use crate::output::OutputSink;
use crate::registry::PluginRegistry;
use agent_plugin_core::LogCommand;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Result a task reports through `task.complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResult {
    Succeeded,
    SucceededWithIssues,
    Failed,
    Cancelled,
    Skipped,
}

impl fmt::Display for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskResult::Succeeded => "Succeeded",
            TaskResult::SucceededWithIssues => "SucceededWithIssues",
            TaskResult::Failed => "Failed",
            TaskResult::Cancelled => "Cancelled",
            TaskResult::Skipped => "Skipped",
        };
        f.write_str(name)
    }
}

impl FromStr for TaskResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "succeeded" => Ok(TaskResult::Succeeded),
            "succeededwithissues" => Ok(TaskResult::SucceededWithIssues),
            "failed" => Ok(TaskResult::Failed),
            "cancelled" | "canceled" => Ok(TaskResult::Cancelled),
            "skipped" => Ok(TaskResult::Skipped),
            _ => Err(format!("Invalid task result: {}", s)),
        }
    }
}

/// Output sink for task plugins.
///
/// `task.complete` records the task result, `task.setsecret` registers a
/// value to mask, commands handled by a command plugin are dispatched to it,
/// and everything else goes to the job output.
pub struct TaskOutputRouter {
    registry: Arc<PluginRegistry>,
    job: JobContext,
    result: Mutex<Option<TaskResult>>,
}

impl TaskOutputRouter {
    pub fn new(registry: Arc<PluginRegistry>, job: JobContext) -> Self {
        Self {
            registry,
            job,
            result: Mutex::new(None),
        }
    }

    /// Last result the task reported, if any
    pub fn result(&self) -> Option<TaskResult> {
        self.result.lock().ok().and_then(|result| *result)
    }

    fn complete(&self, command: &LogCommand) {
        let reported = command.get_property("result").unwrap_or("Succeeded");
        match reported.parse::<TaskResult>() {
            Ok(result) => {
                debug!(%result, "Task reported completion");
                if let Ok(mut slot) = self.result.lock() {
                    *slot = Some(result);
                }
            }
            Err(e) => warn!(error = %e, "Ignoring task completion"),
        }
    }
}

impl OutputSink for TaskOutputRouter {
    fn write_line(&self, line: &str) {
        let Some(command) = LogCommand::parse(line) else {
            self.job.write_line(line);
            return;
        };

        match command.key().as_str() {
            "task.complete" => {
                self.complete(&command);
                self.job.write_line(line);
            }
            "task.setsecret" => self.job.masker().add(&command.data),
            _ if self.registry.supports_command(&command.area, &command.event) => {
                let key = command.key();
                if let Err(e) = self.registry.dispatch_command(&self.job, command) {
                    warn!(command = %key, error = %e, "Failed to dispatch command");
                    self.job.write_line(&format!("##[error]{}", e));
                }
            }
            _ => self.job.write_line(line),
        }
    }
}
