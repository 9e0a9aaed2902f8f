//! Child-side launcher for agent plugins
//!
//! Invoked as `agent-plugin-host <kind> <typeRef>` with exactly one JSON
//! execution context on stdin. Exit code 0 means the plugin was dispatched;
//! its own success or failure is reported on stdout.

pub mod args;
pub mod error;
pub mod host;

pub use args::HostArgs;
pub use error::{infrastructure_report, HostError};
pub use host::{PluginHost, PluginOutcome};
