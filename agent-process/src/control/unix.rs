use super::ProcessControl;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io;
use tracing::{debug, warn};

pub struct UnixProcessControl;

impl UnixProcessControl {
    fn send(pid: u32, sig: Signal) -> io::Result<()> {
        let raw = i32::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        signal::kill(Pid::from_raw(raw), sig).map_err(io::Error::from)
    }
}

impl ProcessControl for UnixProcessControl {
    fn interrupt(&self, pid: u32) -> io::Result<()> {
        debug!(pid, "Sending SIGINT");
        Self::send(pid, Signal::SIGINT)
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        debug!(pid, "Sending SIGTERM");
        Self::send(pid, Signal::SIGTERM)
    }

    fn kill_tree(&self, pid: u32) {
        match Self::send(pid, Signal::SIGKILL) {
            Ok(()) => debug!(pid, "Sent SIGKILL"),
            Err(e) if e.raw_os_error() == Some(Errno::ESRCH as i32) => {
                debug!(pid, "Process already exited")
            }
            Err(e) => warn!(pid, error = %e, "Failed to kill process"),
        }
    }
}
