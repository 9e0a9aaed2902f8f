//! Plugin contracts and the contexts plugins run against

use crate::command::{LogCommand, COMMAND_ECHO_PREFIX};
use crate::context::{
    CommandPluginExecutionContext, RepositoryResource, ServiceEndpoint, Stage,
    TaskPluginExecutionContext, VariableValue,
};
use crate::error::{PluginError, PluginResult};
use crate::output::PluginOutput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

/// The two kinds of plugin a host can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Task,
    Command,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Command => write!(f, "command"),
        }
    }
}

impl FromStr for PluginKind {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("task") {
            Ok(Self::Task)
        } else if s.eq_ignore_ascii_case("command") {
            Ok(Self::Command)
        } else {
            Err(PluginError::UnsupportedKind(s.to_string()))
        }
    }
}

/// Reporting operations shared by task and command contexts.
///
/// Everything is written to the plugin's stdout as plain text or as a
/// logging command the agent interprets.
pub trait ContextOutput {
    fn plugin_output(&self) -> &PluginOutput;

    fn output(&self, message: &str) {
        self.plugin_output().write_stdout_line(message);
    }

    fn debug(&self, message: &str) {
        self.emit(LogCommand::new("task", "debug").data(message));
    }

    fn warning(&self, message: &str) {
        self.emit(
            LogCommand::new("task", "logissue")
                .property("type", "warning")
                .data(message),
        );
    }

    fn error(&self, message: &str) {
        self.emit(
            LogCommand::new("task", "logissue")
                .property("type", "error")
                .data(message),
        );
    }

    fn progress(&self, percent: u8, operation: &str) {
        self.emit(
            LogCommand::new("task", "setprogress")
                .property("value", percent.min(100).to_string())
                .data(operation),
        );
    }

    fn set_secret(&self, value: &str) {
        self.emit(LogCommand::new("task", "setsecret").data(value));
    }

    /// Echo a command line about to be executed
    fn command(&self, command_line: &str) {
        self.plugin_output()
            .write_stdout_line(&format!("{}{}", COMMAND_ECHO_PREFIX, command_line));
    }

    /// Report the plugin as failed
    fn fail(&self, message: &str) {
        self.emit(failure_command(message));
    }

    fn emit(&self, command: LogCommand) {
        self.plugin_output().write_stdout_line(&command.to_string());
    }
}

/// The in-band failure marker
pub fn failure_command(message: &str) -> LogCommand {
    LogCommand::new("task", "complete")
        .property("result", "Failed")
        .data(message)
}

/// What a task plugin sees while running
pub struct TaskContext {
    execution: TaskPluginExecutionContext,
    output: PluginOutput,
}

impl TaskContext {
    pub fn new(execution: TaskPluginExecutionContext, output: PluginOutput) -> Self {
        Self { execution, output }
    }

    pub fn execution(&self) -> &TaskPluginExecutionContext {
        &self.execution
    }

    pub fn stage(&self) -> Stage {
        self.execution.stage
    }

    pub fn input(&self, name: &str) -> Option<&str> {
        self.execution.input(name)
    }

    /// Input value that must be present and non-blank
    pub fn required_input(&self, name: &str) -> PluginResult<&str> {
        match self.input(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(PluginError::MissingInput(name.to_string())),
        }
    }

    pub fn variable(&self, name: &str) -> Option<&VariableValue> {
        self.execution.variable(name)
    }

    pub fn task_variable(&self, name: &str) -> Option<&VariableValue> {
        self.execution.task_variable(name)
    }

    pub fn repository(&self, alias: &str) -> PluginResult<&RepositoryResource> {
        self.execution
            .repository(alias)
            .ok_or_else(|| PluginError::RepositoryNotFound(alias.to_string()))
    }

    pub fn endpoint(&self, name: &str) -> Option<&ServiceEndpoint> {
        self.execution.endpoint(name)
    }
}

impl ContextOutput for TaskContext {
    fn plugin_output(&self) -> &PluginOutput {
        &self.output
    }
}

/// What a command plugin sees while running
pub struct CommandContext {
    execution: CommandPluginExecutionContext,
    output: PluginOutput,
}

impl CommandContext {
    pub fn new(execution: CommandPluginExecutionContext, output: PluginOutput) -> Self {
        Self { execution, output }
    }

    pub fn execution(&self) -> &CommandPluginExecutionContext {
        &self.execution
    }

    pub fn data(&self) -> &str {
        &self.execution.data
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.execution.property(name)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableValue> {
        self.execution.variable(name)
    }

    pub fn endpoints(&self) -> &[ServiceEndpoint] {
        &self.execution.endpoints
    }
}

impl ContextOutput for CommandContext {
    fn plugin_output(&self) -> &PluginOutput {
        &self.output
    }

    // stderr content is what fails a command on the agent side
    fn fail(&self, message: &str) {
        self.emit(failure_command(message));
        self.output.write_stderr_line(message);
    }
}

/// A plugin implementing one task, possibly across several stages
#[async_trait]
pub trait TaskPlugin: Send + Sync {
    async fn run(&self, context: &TaskContext, cancel: CancellationToken) -> PluginResult<()>;
}

/// A plugin handling one logging command
#[async_trait]
pub trait CommandPlugin: Send + Sync {
    async fn process(&self, context: &CommandContext, cancel: CancellationToken)
        -> PluginResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("TASK".parse::<PluginKind>().unwrap(), PluginKind::Task);
        assert_eq!("command".parse::<PluginKind>().unwrap(), PluginKind::Command);
        assert!(matches!(
            "job".parse::<PluginKind>(),
            Err(PluginError::UnsupportedKind(_))
        ));
    }

    #[test]
    fn test_task_context_commands() {
        let (output, captured) = PluginOutput::captured();
        let ctx = TaskContext::new(TaskPluginExecutionContext::default(), output);

        ctx.output("plain");
        ctx.debug("details");
        ctx.warning("careful");
        ctx.error("bad");
        ctx.progress(150, "Fetching");
        ctx.set_secret("hunter2");
        ctx.command("git fetch");
        ctx.fail("it broke; badly");

        assert_eq!(
            captured.stdout_lines(),
            vec![
                "plain",
                "##vso[task.debug]details",
                "##vso[task.logissue type=warning;]careful",
                "##vso[task.logissue type=error;]bad",
                "##vso[task.setprogress value=100;]Fetching",
                "##vso[task.setsecret]hunter2",
                "##[command]git fetch",
                "##vso[task.complete result=Failed;]it broke; badly",
            ]
        );
        assert!(captured.stderr_lines().is_empty());
    }

    #[test]
    fn test_command_context_fail_writes_stderr() {
        let (output, captured) = PluginOutput::captured();
        let ctx = CommandContext::new(CommandPluginExecutionContext::default(), output);
        ctx.fail("upload failed");

        assert_eq!(
            captured.stdout_lines(),
            vec!["##vso[task.complete result=Failed;]upload failed"]
        );
        assert_eq!(captured.stderr_lines(), vec!["upload failed"]);
    }

    #[test]
    fn test_required_input() {
        let mut execution = TaskPluginExecutionContext::default();
        execution.inputs.insert("path".into(), " ".into());
        let (output, _) = PluginOutput::captured();
        let ctx = TaskContext::new(execution, output);

        assert!(matches!(
            ctx.required_input("path"),
            Err(PluginError::MissingInput(_))
        ));
        assert!(ctx.required_input("missing").is_err());
    }
}
