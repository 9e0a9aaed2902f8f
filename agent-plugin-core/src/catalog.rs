//! Compiled-in dispatch table of available plugins

use crate::context::Stage;
use crate::error::{PluginError, PluginResult};
use crate::plugin::{CommandPlugin, TaskPlugin};
use std::collections::HashMap;
use uuid::Uuid;

pub type TaskPluginFactory = fn() -> Box<dyn TaskPlugin>;
pub type CommandPluginFactory = fn() -> Box<dyn CommandPlugin>;

/// An input a task declares, with its default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInputDescriptor {
    pub name: String,
    pub label: String,
    pub default_value: Option<String>,
    pub required: bool,
}

impl TaskInputDescriptor {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            default_value: None,
            required: false,
        }
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Metadata of a task plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPluginDescriptor {
    pub id: Uuid,
    pub version: String,
    pub name: String,
    pub friendly_name: String,
    pub description: String,
    pub author: String,
    pub inputs: Vec<TaskInputDescriptor>,
    pub stages: Vec<Stage>,
}

impl TaskPluginDescriptor {
    pub fn new(id: Uuid, version: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            version: version.into(),
            friendly_name: name.clone(),
            name,
            description: String::new(),
            author: String::new(),
            inputs: Vec::new(),
            stages: vec![Stage::Main],
        }
    }

    pub fn friendly_name(mut self, friendly_name: impl Into<String>) -> Self {
        self.friendly_name = friendly_name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn input(mut self, input: TaskInputDescriptor) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn stages(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.stages = stages.into_iter().collect();
        self
    }

    /// The string the host is invoked with
    pub fn type_ref(&self) -> String {
        self.id.to_string()
    }

    pub fn supports_stage(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

/// Metadata of a command plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPluginDescriptor {
    pub area: String,
    pub event: String,
    pub display_name: String,
}

impl CommandPluginDescriptor {
    pub fn new(
        area: impl Into<String>,
        event: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            area: area.into(),
            event: event.into(),
            display_name: display_name.into(),
        }
    }

    /// Lower-cased `area.event`, also the host type reference
    pub fn key(&self) -> String {
        format!("{}.{}", self.area, self.event).to_lowercase()
    }
}

struct TaskEntry {
    descriptor: TaskPluginDescriptor,
    factory: TaskPluginFactory,
}

struct CommandEntry {
    descriptor: CommandPluginDescriptor,
    factory: CommandPluginFactory,
}

/// Closed set of plugins known to this build. Built once, read-only after.
#[derive(Default)]
pub struct PluginCatalog {
    tasks: HashMap<Uuid, TaskEntry>,
    commands: HashMap<String, CommandEntry>,
}

impl PluginCatalog {
    pub fn builder() -> PluginCatalogBuilder {
        PluginCatalogBuilder::default()
    }

    pub fn task_descriptor(&self, id: &Uuid) -> Option<&TaskPluginDescriptor> {
        self.tasks.get(id).map(|entry| &entry.descriptor)
    }

    pub fn command_descriptor(&self, key: &str) -> Option<&CommandPluginDescriptor> {
        self.commands
            .get(&key.to_lowercase())
            .map(|entry| &entry.descriptor)
    }

    pub fn task_descriptors(&self) -> impl Iterator<Item = &TaskPluginDescriptor> {
        self.tasks.values().map(|entry| &entry.descriptor)
    }

    pub fn command_descriptors(&self) -> impl Iterator<Item = &CommandPluginDescriptor> {
        self.commands.values().map(|entry| &entry.descriptor)
    }

    /// Instantiate the task plugin for a GUID type reference
    pub fn create_task(&self, type_ref: &str) -> PluginResult<Box<dyn TaskPlugin>> {
        let id = Uuid::parse_str(type_ref.trim())
            .map_err(|_| PluginError::UnknownTypeRef(type_ref.to_string()))?;
        self.tasks
            .get(&id)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| PluginError::UnknownTypeRef(type_ref.to_string()))
    }

    /// Instantiate the command plugin for an `area.event` type reference
    pub fn create_command(&self, type_ref: &str) -> PluginResult<Box<dyn CommandPlugin>> {
        self.commands
            .get(&type_ref.trim().to_lowercase())
            .map(|entry| (entry.factory)())
            .ok_or_else(|| PluginError::UnknownTypeRef(type_ref.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tasks.len() + self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct PluginCatalogBuilder {
    tasks: Vec<TaskEntry>,
    commands: Vec<CommandEntry>,
}

impl PluginCatalogBuilder {
    pub fn task(mut self, descriptor: TaskPluginDescriptor, factory: TaskPluginFactory) -> Self {
        self.tasks.push(TaskEntry {
            descriptor,
            factory,
        });
        self
    }

    pub fn command(
        mut self,
        descriptor: CommandPluginDescriptor,
        factory: CommandPluginFactory,
    ) -> Self {
        self.commands.push(CommandEntry {
            descriptor,
            factory,
        });
        self
    }

    /// Fails on duplicate task ids or duplicate `area.event` keys
    pub fn build(self) -> PluginResult<PluginCatalog> {
        let mut catalog = PluginCatalog::default();

        for entry in self.tasks {
            let id = entry.descriptor.id;
            if catalog.tasks.contains_key(&id) {
                return Err(PluginError::AlreadyRegistered(id.to_string()));
            }
            tracing::debug!(
                target: "plugin_catalog",
                plugin_id = %id,
                name = %entry.descriptor.name,
                "Registered task plugin"
            );
            catalog.tasks.insert(id, entry);
        }

        for entry in self.commands {
            let key = entry.descriptor.key();
            if catalog.commands.contains_key(&key) {
                return Err(PluginError::AlreadyRegistered(key));
            }
            tracing::debug!(target: "plugin_catalog", command = %key, "Registered command plugin");
            catalog.commands.insert(key, entry);
        }

        Ok(catalog)
    }
}
