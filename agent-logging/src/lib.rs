//! Tracing initialisation for agent processes

mod init;

pub use init::{init_logging_from_config, init_simple_tracing, init_stderr_tracing};
