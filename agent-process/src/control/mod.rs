//! Platform process signalling and tree termination

use std::io;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::UnixProcessControl;
#[cfg(windows)]
pub use windows::WindowsProcessControl;

/// Signals a running process by pid.
///
/// `interrupt` and `terminate` are the graceful steps of cancellation;
/// an error means the signal was not delivered and the caller moves to the
/// next step.
/// `kill_tree` is best effort and never fails.
pub trait ProcessControl: Send + Sync {
    /// SIGINT or the Ctrl+C equivalent
    fn interrupt(&self, pid: u32) -> io::Result<()>;

    /// SIGTERM or the Ctrl+Break equivalent
    fn terminate(&self, pid: u32) -> io::Result<()>;

    /// Forcefully end the process and, where the platform allows, its descendants
    fn kill_tree(&self, pid: u32);
}

/// Control implementation for the current platform
pub fn platform_control() -> Box<dyn ProcessControl> {
    #[cfg(unix)]
    {
        Box::new(UnixProcessControl)
    }
    #[cfg(windows)]
    {
        Box::new(WindowsProcessControl)
    }
}
