//! Registry of task and command plugins and their invocation through the host
//!
//! The registry is built once at startup and is immutable afterwards. Each
//! invocation serializes an execution context snapshot and runs
//! `<host> <kind> <typeRef>` with that snapshot as the only stdin line.

use crate::definitions::{
    command_key, compare_versions, CommandPluginDefinition, TaskPluginDefinition,
};
use crate::error::{WorkerError, WorkerResult};
use crate::job::JobContext;
use crate::launcher::PluginHostLauncher;
use crate::output::OutputSink;
use agent_plugin_core::context::lookup_ignore_case;
use agent_plugin_core::transport::encode_context;
use agent_plugin_core::{
    CommandPluginExecutionContext, LogCommand, PluginCatalog, PluginError, PluginKind, Stage,
    TaskPluginExecutionContext,
};
use agent_process::{ProcessError, ProcessExecutor, ProcessSpec};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

pub struct PluginRegistry {
    /// Versions of each task, ascending
    tasks: HashMap<Uuid, Vec<TaskPluginDefinition>>,
    commands: HashMap<String, CommandPluginDefinition>,
    launcher: PluginHostLauncher,
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    /// Registry mirroring the host's compiled-in catalog
    pub fn from_catalog(
        catalog: &PluginCatalog,
        launcher: PluginHostLauncher,
    ) -> WorkerResult<Self> {
        Self::builder().catalog(catalog).build(launcher)
    }

    /// A specific version, or the latest when `version` is `None`
    pub fn task_definition(
        &self,
        id: &Uuid,
        version: Option<&str>,
    ) -> Option<&TaskPluginDefinition> {
        let versions = self.tasks.get(id)?;
        match version {
            Some(version) => versions.iter().find(|d| d.version == version),
            None => versions.last(),
        }
    }

    pub fn command_definition(&self, area: &str, event: &str) -> Option<&CommandPluginDefinition> {
        self.commands.get(&command_key(area, event))
    }

    pub fn supports_command(&self, area: &str, event: &str) -> bool {
        self.command_definition(area, event).is_some()
    }

    pub fn task_definitions(&self) -> impl Iterator<Item = &TaskPluginDefinition> {
        self.tasks.values().flatten()
    }

    pub fn command_definitions(&self) -> impl Iterator<Item = &CommandPluginDefinition> {
        self.commands.values()
    }

    pub fn launcher(&self) -> &PluginHostLauncher {
        &self.launcher
    }

    /// Snapshot of the job for one task invocation.
    ///
    /// Declared input defaults fill in inputs the caller did not supply.
    pub fn build_task_context(
        &self,
        job: &JobContext,
        definition: &TaskPluginDefinition,
        inputs: HashMap<String, String>,
        stage: Stage,
    ) -> TaskPluginExecutionContext {
        let mut inputs = inputs;
        for (name, value) in definition.default_inputs() {
            if lookup_ignore_case(&inputs, name).is_none() {
                inputs.insert(name.to_string(), value.to_string());
            }
        }

        TaskPluginExecutionContext {
            inputs,
            stage,
            repositories: job.repositories().to_vec(),
            endpoints: job.endpoints().to_vec(),
            variables: job.variables_snapshot(),
            task_variables: job.task_variables().clone(),
        }
    }

    pub fn build_command_context(
        &self,
        job: &JobContext,
        command: &LogCommand,
    ) -> CommandPluginExecutionContext {
        CommandPluginExecutionContext {
            data: command.data.clone(),
            properties: command
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            endpoints: job.endpoints().to_vec(),
            variables: job.variables_snapshot(),
        }
    }

    /// Run the latest version of a task plugin for `stage`.
    ///
    /// Every line the host writes goes to `sink`. A required input that is
    /// missing or blank fails before anything is launched. A non-zero host
    /// exit is an error; a failure the plugin reports in-band is not.
    pub async fn run_task_plugin(
        &self,
        job: &JobContext,
        task_id: Uuid,
        inputs: HashMap<String, String>,
        stage: Stage,
        environment: HashMap<String, String>,
        sink: Arc<dyn OutputSink>,
    ) -> WorkerResult<()> {
        let definition = self
            .task_definition(&task_id, None)
            .ok_or(WorkerError::UnknownTask(task_id))?;
        if !definition.supports_stage(stage) {
            return Err(WorkerError::UnsupportedStage {
                task: definition.name.clone(),
                stage,
            });
        }

        let context = self.build_task_context(job, definition, inputs, stage);
        for name in definition.required_inputs() {
            match context.input(name) {
                Some(value) if !value.trim().is_empty() => {}
                _ => return Err(PluginError::MissingInput(name.to_string()).into()),
            }
        }
        self.launcher.verify()?;
        let line = encode_context(&context)?;
        let spec = self
            .launcher
            .spec(PluginKind::Task, &definition.type_ref, line, environment)
            .require_exit_code_zero(true)
            .kill_on_cancel(false);

        info!(
            task = %definition.name,
            version = %definition.version,
            %stage,
            "Running task plugin"
        );
        let mut executor = self
            .launcher
            .executor()
            .on_stdout(relay(Arc::clone(&sink)))
            .on_stderr(relay(sink));
        executor.run(spec, job.cancellation_token()).await?;
        debug!(task = %definition.name, "Task plugin host exited");
        Ok(())
    }

    /// Start a command plugin in the background and track it on the job.
    ///
    /// Fails immediately only for commands no plugin handles. Must be called
    /// from within a Tokio runtime.
    pub fn dispatch_command(&self, job: &JobContext, command: LogCommand) -> WorkerResult<()> {
        let definition = self
            .command_definition(&command.area, &command.event)
            .ok_or_else(|| WorkerError::NotSupported {
                area: command.area.clone(),
                event: command.event.clone(),
            })?;
        self.launcher.verify()?;

        let context = self.build_command_context(job, &command);
        let line = encode_context(&context)?;
        let spec = self
            .launcher
            .spec(PluginKind::Command, &definition.type_ref, line, HashMap::new());

        debug!(command = %definition.key(), "Dispatching command plugin");
        let handle = tokio::spawn(run_command(
            definition.display_name.clone(),
            self.launcher.executor(),
            spec,
            job.clone(),
        ));
        job.async_commands().track(definition.display_name.clone(), handle);
        Ok(())
    }
}

fn relay(sink: Arc<dyn OutputSink>) -> impl FnMut(&[String]) + Send + 'static {
    move |lines: &[String]| {
        for line in lines {
            sink.write_line(line);
        }
    }
}

async fn run_command(
    display_name: String,
    executor: ProcessExecutor,
    spec: ProcessSpec,
    job: JobContext,
) -> WorkerResult<()> {
    let stderr = Arc::new(Mutex::new(Vec::<String>::new()));
    let captured = Arc::clone(&stderr);
    let output = job.clone();
    let mut executor = executor
        .on_stdout(move |lines: &[String]| lines.iter().for_each(|line| output.write_line(line)))
        .on_stderr(move |lines: &[String]| {
            if let Ok(mut captured) = captured.lock() {
                captured.extend_from_slice(lines);
            }
        });

    let program = spec.program_display();
    let arguments = spec.arguments.clone();
    let exit_code = executor.run(spec, job.cancellation_token()).await?;
    let stderr = std::mem::take(&mut *stderr.lock().unwrap_or_else(|p| p.into_inner()));

    if exit_code != 0 {
        for line in &stderr {
            job.write_line(line);
        }
        return Err(ProcessError::ExitCode {
            exit_code,
            program,
            arguments,
        }
        .into());
    }
    if !stderr.is_empty() {
        return Err(WorkerError::CommandStderr {
            command: display_name,
            stderr: job.masker().mask(&stderr.join("\n")),
        });
    }
    Ok(())
}

#[derive(Default)]
pub struct PluginRegistryBuilder {
    tasks: Vec<TaskPluginDefinition>,
    commands: Vec<CommandPluginDefinition>,
}

impl PluginRegistryBuilder {
    pub fn task(mut self, definition: TaskPluginDefinition) -> Self {
        self.tasks.push(definition);
        self
    }

    pub fn command(mut self, definition: CommandPluginDefinition) -> Self {
        self.commands.push(definition);
        self
    }

    /// Register every plugin of a catalog
    pub fn catalog(mut self, catalog: &PluginCatalog) -> Self {
        self.tasks
            .extend(catalog.task_descriptors().map(TaskPluginDefinition::from));
        self.commands
            .extend(catalog.command_descriptors().map(CommandPluginDefinition::from));
        self
    }

    /// Fails on a duplicate task id and version or a duplicate command key
    pub fn build(self, launcher: PluginHostLauncher) -> WorkerResult<PluginRegistry> {
        let mut tasks: HashMap<Uuid, Vec<TaskPluginDefinition>> = HashMap::new();
        for definition in self.tasks {
            let versions = tasks.entry(definition.id).or_default();
            if versions.iter().any(|d| d.version == definition.version) {
                return Err(PluginError::AlreadyRegistered(format!(
                    "{}@{}",
                    definition.id, definition.version
                ))
                .into());
            }
            debug!(
                target: "plugin_registry",
                id = %definition.id,
                version = %definition.version,
                "Registered task plugin"
            );
            versions.push(definition);
        }
        for versions in tasks.values_mut() {
            versions.sort_by(|a, b| compare_versions(&a.version, &b.version));
        }

        let mut commands = HashMap::new();
        for definition in self.commands {
            let key = definition.key();
            if commands.contains_key(&key) {
                return Err(PluginError::AlreadyRegistered(key).into());
            }
            debug!(target: "plugin_registry", command = %key, "Registered command plugin");
            commands.insert(key, definition);
        }

        Ok(PluginRegistry {
            tasks,
            commands,
            launcher,
        })
    }
}
