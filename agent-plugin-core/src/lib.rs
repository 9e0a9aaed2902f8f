//! Contracts shared by the agent and its plugin host
//!
//! - [`context`]: execution contexts serialized onto the plugin's stdin
//! - [`command`]: `##vso[...]` logging command format
//! - [`plugin`]: task/command plugin traits and the contexts they run against
//! - [`catalog`]: the compiled-in table mapping type references to plugins

pub mod catalog;
pub mod command;
pub mod context;
pub mod error;
pub mod output;
pub mod plugin;
pub mod transport;

pub use catalog::{
    CommandPluginDescriptor, PluginCatalog, PluginCatalogBuilder, TaskInputDescriptor,
    TaskPluginDescriptor,
};
pub use command::LogCommand;
pub use context::{
    CommandPluginExecutionContext, EndpointAuthorization, RepositoryResource, ServiceEndpoint,
    Stage, TaskPluginExecutionContext, VariableValue,
};
pub use error::{PluginError, PluginResult};
pub use output::{CapturedOutput, PluginOutput};
pub use plugin::{
    failure_command, CommandContext, CommandPlugin, ContextOutput, PluginKind, TaskContext,
    TaskPlugin,
};
