use super::ProcessControl;
use crate::tree::{kill_order, ProcessRecord};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, warn};
use windows_sys::Win32::Foundation::{BOOL, FALSE, TRUE};
use windows_sys::Win32::System::Console::{
    AttachConsole, FreeConsole, GenerateConsoleCtrlEvent, SetConsoleCtrlHandler, CTRL_BREAK_EVENT,
    CTRL_C_EVENT,
};

/// Serialises console switching; a process has at most one console attached
static CONSOLE: Mutex<()> = Mutex::new(());

/// Events raised on a child's console that will also reach this process
static PENDING_SELF_EVENTS: AtomicUsize = AtomicUsize::new(0);

static INSTALL_HANDLER: Once = Once::new();

unsafe extern "system" fn swallow_own_events(ctrl_type: u32) -> BOOL {
    if ctrl_type != CTRL_C_EVENT && ctrl_type != CTRL_BREAK_EVENT {
        return FALSE;
    }
    let swallowed = PENDING_SELF_EVENTS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if swallowed {
        TRUE
    } else {
        FALSE
    }
}

/// Raise `event` on the console of `pid` by attaching to it
fn send_ctrl_event(pid: u32, event: u32) -> io::Result<()> {
    let _console = CONSOLE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    // SAFETY: the handler is a plain `extern "system"` fn that lives for the program
    INSTALL_HANDLER.call_once(|| unsafe {
        SetConsoleCtrlHandler(Some(swallow_own_events), TRUE);
    });

    // SAFETY: console calls take no pointers; the console lock keeps the
    // detach/attach/raise/detach sequence exclusive to this thread
    unsafe {
        FreeConsole();
        if AttachConsole(pid) == FALSE {
            return Err(io::Error::last_os_error());
        }

        PENDING_SELF_EVENTS.fetch_add(1, Ordering::SeqCst);
        let result = if GenerateConsoleCtrlEvent(event, 0) == FALSE {
            let _ = PENDING_SELF_EVENTS
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        };

        FreeConsole();
        result
    }
}

pub struct WindowsProcessControl;

impl WindowsProcessControl {
    fn snapshot(system: &System) -> Vec<ProcessRecord> {
        system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessRecord {
                pid: pid.as_u32(),
                parent_pid: process.parent().map(|p| p.as_u32()),
            })
            .collect()
    }
}

impl ProcessControl for WindowsProcessControl {
    fn interrupt(&self, pid: u32) -> io::Result<()> {
        debug!(pid, "Sending Ctrl+C");
        send_ctrl_event(pid, CTRL_C_EVENT)
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        debug!(pid, "Sending Ctrl+Break");
        send_ctrl_event(pid, CTRL_BREAK_EVENT)
    }

    fn kill_tree(&self, pid: u32) {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        for victim in kill_order(pid, &Self::snapshot(&system)) {
            match system.process(Pid::from_u32(victim)) {
                Some(process) => {
                    if process.kill() {
                        debug!(pid = victim, "Killed process");
                    } else {
                        warn!(pid = victim, "Failed to kill process");
                    }
                }
                None => debug!(pid = victim, "Process already exited"),
            }
        }
    }
}
