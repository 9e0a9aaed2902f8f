//! External process execution for the build agent
//!
//! A [`ProcessExecutor`] runs one child process, reads stdout and stderr on
//! dedicated tasks and hands line batches to caller-supplied handlers from a
//! single coordinator. Cancellation escalates from interrupt to terminate to
//! a process-tree kill, with every wait bounded by [`ProcessConfig`] timeouts.
//!
//! [`ProcessConfig`]: agent_config::ProcessConfig

pub mod control;
pub mod error;
pub mod executor;
mod reader;
pub mod spec;
pub mod tree;

pub use control::{platform_control, ProcessControl};
pub use error::ProcessError;
pub use executor::{OutputHandler, ProcessExecutor};
pub use reader::StreamKind;
pub use spec::{OutputEncoding, ProcessSpec};
pub use tree::{kill_order, ProcessRecord};
