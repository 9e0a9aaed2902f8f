//! Registry entries describing how to launch a plugin

use agent_plugin_core::{
    CommandPluginDescriptor, Stage, TaskInputDescriptor, TaskPluginDescriptor,
};
use std::cmp::Ordering;
use uuid::Uuid;

/// A task plugin as seen from the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPluginDefinition {
    pub id: Uuid,
    pub version: String,
    pub name: String,
    pub friendly_name: String,
    pub description: String,
    pub author: String,
    /// Reference the host resolves the plugin by
    pub type_ref: String,
    pub inputs: Vec<TaskInputDescriptor>,
    pub stages: Vec<Stage>,
}

impl TaskPluginDefinition {
    pub fn supports_stage(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// Names of inputs that must be present and non-blank before launch
    pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|input| input.required)
            .map(|input| input.name.as_str())
    }

    /// Declared defaults for inputs the caller did not supply
    pub fn default_inputs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inputs.iter().filter_map(|input| {
            input
                .default_value
                .as_deref()
                .map(|value| (input.name.as_str(), value))
        })
    }
}

impl From<&TaskPluginDescriptor> for TaskPluginDefinition {
    fn from(descriptor: &TaskPluginDescriptor) -> Self {
        Self {
            id: descriptor.id,
            version: descriptor.version.clone(),
            name: descriptor.name.clone(),
            friendly_name: descriptor.friendly_name.clone(),
            description: descriptor.description.clone(),
            author: descriptor.author.clone(),
            type_ref: descriptor.type_ref(),
            inputs: descriptor.inputs.clone(),
            stages: descriptor.stages.clone(),
        }
    }
}

/// A logging command plugin as seen from the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPluginDefinition {
    pub area: String,
    pub event: String,
    pub display_name: String,
    pub type_ref: String,
}

impl CommandPluginDefinition {
    pub fn key(&self) -> String {
        command_key(&self.area, &self.event)
    }
}

impl From<&CommandPluginDescriptor> for CommandPluginDefinition {
    fn from(descriptor: &CommandPluginDescriptor) -> Self {
        Self {
            area: descriptor.area.clone(),
            event: descriptor.event.clone(),
            display_name: descriptor.display_name.clone(),
            type_ref: descriptor.key(),
        }
    }
}

pub(crate) fn command_key(area: &str, event: &str) -> String {
    format!("{}.{}", area, event).to_lowercase()
}

/// Orders dotted versions numerically, falling back to text for non-numeric parts
pub(crate) fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}
