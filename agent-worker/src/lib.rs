//! Agent-side plugin plumbing
//!
//! [`PluginRegistry`] maps task ids and logging commands to plugins, builds
//! the execution context for each invocation and runs the plugin host through
//! the process executor. [`JobContext`] carries the job state those contexts
//! are built from, and [`TaskOutputRouter`] interprets what a task writes.

pub mod definitions;
pub mod error;
pub mod job;
pub mod launcher;
pub mod output;
pub mod registry;
pub mod router;

pub use definitions::{CommandPluginDefinition, TaskPluginDefinition};
pub use error::{WorkerError, WorkerResult};
pub use job::{AsyncCommandTracker, JobContext};
pub use launcher::PluginHostLauncher;
pub use output::{CollectingSink, OutputSink, SecretMasker};
pub use registry::{PluginRegistry, PluginRegistryBuilder};
pub use router::{TaskOutputRouter, TaskResult};
