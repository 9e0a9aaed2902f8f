//! Single-use external process runner

use crate::control::{platform_control, ProcessControl};
use crate::error::ProcessError;
use crate::reader::{spawn_line_reader, StreamKind};
use crate::spec::ProcessSpec;
use agent_config::ProcessConfig;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives a batch of lines from one output stream, in production order
pub type OutputHandler = Box<dyn FnMut(&[String]) + Send>;

/// How long to wait for exit after the final kill before giving up on the process
const KILL_WAIT: std::time::Duration = std::time::Duration::from_secs(5);

/// Cancellation progress. Each step carries the time it gives up waiting.
#[derive(Debug, Clone, Copy)]
enum Escalation {
    Idle,
    Interrupted { until: Instant },
    Terminated { until: Instant },
    Killed { until: Instant },
    Abandoned,
}

impl Escalation {
    fn deadline(&self) -> Option<Instant> {
        match self {
            Escalation::Interrupted { until }
            | Escalation::Terminated { until }
            | Escalation::Killed { until } => Some(*until),
            Escalation::Idle | Escalation::Abandoned => None,
        }
    }
}

/// Runs exactly one external process, draining stdout and stderr
/// concurrently and delivering lines to the registered handlers.
pub struct ProcessExecutor {
    config: ProcessConfig,
    control: Box<dyn ProcessControl>,
    on_stdout: Option<OutputHandler>,
    on_stderr: Option<OutputHandler>,
    started: bool,
}

impl ProcessExecutor {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            control: platform_control(),
            on_stdout: None,
            on_stderr: None,
            started: false,
        }
    }

    /// Replace the platform signalling implementation
    pub fn with_control(mut self, control: Box<dyn ProcessControl>) -> Self {
        self.control = control;
        self
    }

    pub fn on_stdout(mut self, handler: impl FnMut(&[String]) + Send + 'static) -> Self {
        self.on_stdout = Some(Box::new(handler));
        self
    }

    pub fn on_stderr(mut self, handler: impl FnMut(&[String]) + Send + 'static) -> Self {
        self.on_stderr = Some(Box::new(handler));
        self
    }

    /// Start the process described by `spec` and wait for it to finish.
    ///
    /// Returns the exit code. Every line the process wrote is delivered to the
    /// handlers before this returns, including when the run is cancelled.
    pub async fn run(
        &mut self,
        spec: ProcessSpec,
        cancel: &CancellationToken,
    ) -> Result<i32, ProcessError> {
        if self.started {
            return Err(ProcessError::AlreadyStarted);
        }
        self.started = true;

        if spec.program.as_os_str().is_empty() {
            return Err(ProcessError::InvalidArguments(
                "program path is empty".to_string(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }

        let mut command = self.build_command(&spec)?;
        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program_display(),
            source,
        })?;
        let pid = child.id();
        info!(
            pid = ?pid,
            program = %spec.program.display(),
            arguments = %spec.arguments,
            "Started process"
        );

        let stdin_task = match (child.stdin.take(), spec.contents_to_standard_in.clone()) {
            (Some(stdin), Some(lines)) => Some(tokio::spawn(write_stdin(stdin, lines))),
            _ => None,
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not captured"))?;

        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (err_tx, mut err_rx) = mpsc::unbounded_channel();
        let readers = [
            spawn_line_reader(StreamKind::Stdout, stdout, spec.output_encoding, out_tx),
            spawn_line_reader(StreamKind::Stderr, stderr, spec.output_encoding, err_tx),
        ];

        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut exit: Option<io::Result<ExitStatus>> = None;
        let mut cancel_requested = false;
        let mut escalation = Escalation::Idle;
        let mut drain_deadline: Option<Instant> = None;

        loop {
            if exit.is_some() && !stdout_open && !stderr_open {
                break;
            }

            tokio::select! {
                line = out_rx.recv(), if stdout_open => match line {
                    Some(first) => self.dispatch(StreamKind::Stdout, first, &mut out_rx),
                    None => stdout_open = false,
                },
                line = err_rx.recv(), if stderr_open => match line {
                    Some(first) => self.dispatch(StreamKind::Stderr, first, &mut err_rx),
                    None => stderr_open = false,
                },
                status = child.wait(), if exit.is_none() => {
                    match &status {
                        Ok(status) => {
                            info!(pid = ?pid, exit_code = exit_code_of(*status), "Process exited")
                        }
                        Err(e) => warn!(pid = ?pid, error = %e, "Failed to wait for process"),
                    }
                    exit = Some(status);
                    if stdout_open || stderr_open {
                        drain_deadline = Some(Instant::now() + self.config.stream_drain_timeout);
                    }
                }
                _ = cancel.cancelled(), if !cancel_requested && exit.is_none() => {
                    cancel_requested = true;
                    info!(pid = ?pid, kill_on_cancel = spec.kill_on_cancel, "Cancelling process");
                    escalation = match pid {
                        Some(pid) if spec.kill_on_cancel => self.kill(pid),
                        Some(pid) => self.interrupt(pid),
                        None => Escalation::Abandoned,
                    };
                }
                _ = deadline(escalation.deadline()), if exit.is_none() => {
                    escalation = match (escalation, pid) {
                        (Escalation::Interrupted { .. }, Some(pid)) => self.terminate(pid),
                        (Escalation::Terminated { .. }, Some(pid)) => self.kill(pid),
                        _ => {
                            warn!(pid = ?pid, "Process did not exit after kill, abandoning it");
                            Escalation::Abandoned
                        }
                    };
                    if matches!(escalation, Escalation::Abandoned) {
                        break;
                    }
                }
                _ = deadline(drain_deadline) => {
                    // the pid is already reaped; whatever holds the pipes is not our child
                    warn!(
                        pid = ?pid,
                        timeout_secs = self.config.stream_drain_timeout.as_secs(),
                        "Output streams still open after process exit, not waiting further"
                    );
                    break;
                }
            }
        }

        self.flush(StreamKind::Stdout, &mut out_rx);
        self.flush(StreamKind::Stderr, &mut err_rx);
        for reader in readers {
            reader.abort();
        }
        if let Some(task) = stdin_task {
            task.abort();
        }

        if cancel_requested {
            info!(pid = ?pid, "Process execution cancelled");
            return Err(ProcessError::Cancelled);
        }

        let exit_code = match exit {
            Some(status) => exit_code_of(status?),
            None => return Err(ProcessError::Cancelled),
        };

        if spec.require_exit_code_zero && exit_code != 0 {
            return Err(ProcessError::ExitCode {
                exit_code,
                program: spec.program_display(),
                arguments: spec.arguments.clone(),
            });
        }

        Ok(exit_code)
    }

    fn build_command(&self, spec: &ProcessSpec) -> Result<Command, ProcessError> {
        let mut command = Command::new(&spec.program);

        #[cfg(windows)]
        {
            if !spec.arguments.trim().is_empty() {
                command.raw_arg(&spec.arguments);
            }
        }
        #[cfg(not(windows))]
        {
            let args = spec.split_arguments().ok_or_else(|| {
                ProcessError::InvalidArguments(format!("unbalanced quotes in '{}'", spec.arguments))
            })?;
            command.args(args);
        }

        if let Some(dir) = &spec.working_directory {
            command.current_dir(dir);
        }

        command
            .envs(&spec.environment)
            .env(
                &self.config.build_marker_variable,
                &self.config.build_marker_value,
            )
            .stdin(if spec.contents_to_standard_in.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Ok(command)
    }

    fn interrupt(&self, pid: u32) -> Escalation {
        match self.control.interrupt(pid) {
            Ok(()) => Escalation::Interrupted {
                until: Instant::now() + self.config.interrupt_timeout,
            },
            Err(e) => {
                debug!(pid, error = %e, "Interrupt not delivered");
                self.terminate(pid)
            }
        }
    }

    fn terminate(&self, pid: u32) -> Escalation {
        match self.control.terminate(pid) {
            Ok(()) => Escalation::Terminated {
                until: Instant::now() + self.config.terminate_timeout,
            },
            Err(e) => {
                debug!(pid, error = %e, "Terminate not delivered");
                self.kill(pid)
            }
        }
    }

    fn kill(&self, pid: u32) -> Escalation {
        self.control.kill_tree(pid);
        Escalation::Killed {
            until: Instant::now() + KILL_WAIT,
        }
    }

    fn dispatch(
        &mut self,
        kind: StreamKind,
        first: String,
        rx: &mut mpsc::UnboundedReceiver<String>,
    ) {
        let mut batch = vec![first];
        while let Ok(line) = rx.try_recv() {
            batch.push(line);
        }
        self.deliver(kind, &batch);
    }

    fn flush(&mut self, kind: StreamKind, rx: &mut mpsc::UnboundedReceiver<String>) {
        let mut batch = Vec::new();
        while let Ok(line) = rx.try_recv() {
            batch.push(line);
        }
        if !batch.is_empty() {
            self.deliver(kind, &batch);
        }
    }

    fn deliver(&mut self, kind: StreamKind, batch: &[String]) {
        let handler = match kind {
            StreamKind::Stdout => self.on_stdout.as_mut(),
            StreamKind::Stderr => self.on_stderr.as_mut(),
        };
        if let Some(handler) = handler {
            handler(batch);
        }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(ProcessConfig::default())
    }
}

async fn write_stdin(mut stdin: ChildStdin, lines: Vec<String>) {
    for line in lines {
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await
        }
        .await;
        if let Err(e) = written {
            warn!(error = %e, "Failed to write to process stdin");
            return;
        }
    }
    if let Err(e) = stdin.shutdown().await {
        debug!(error = %e, "Failed to close process stdin");
    }
}

/// Pending forever when there is no deadline
async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_run_is_rejected_without_spawning() {
        let mut executor = ProcessExecutor::default();
        executor.started = true;
        let result = executor
            .run(ProcessSpec::new("true"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ProcessError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_empty_program_is_invalid() {
        let mut executor = ProcessExecutor::default();
        let result = executor
            .run(ProcessSpec::default(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ProcessError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_does_not_spawn() {
        let token = CancellationToken::new();
        token.cancel();
        let mut executor = ProcessExecutor::default();
        let result = executor
            .run(ProcessSpec::new("/definitely/not/a/program"), &token)
            .await;
        assert!(matches!(result, Err(ProcessError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline_without_instant_stays_pending() {
        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), deadline(None));
        assert!(pending.await.is_err());
    }

    #[test]
    fn test_escalation_deadlines() {
        let now = Instant::now();
        assert!(Escalation::Idle.deadline().is_none());
        assert_eq!(Escalation::Terminated { until: now }.deadline(), Some(now));
        assert!(Escalation::Abandoned.deadline().is_none());
    }
}
