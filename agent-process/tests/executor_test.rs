//! Process executor behaviour against real child processes

#![cfg(unix)]

use agent_config::ProcessConfig;
use agent_process::{platform_control, ProcessControl, ProcessError, ProcessExecutor, ProcessSpec};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

type Lines = Arc<Mutex<Vec<String>>>;

fn collecting_executor(config: ProcessConfig) -> (ProcessExecutor, Lines, Lines) {
    let stdout: Lines = Arc::default();
    let stderr: Lines = Arc::default();
    let out = stdout.clone();
    let err = stderr.clone();
    let executor = ProcessExecutor::new(config)
        .on_stdout(move |batch| out.lock().unwrap().extend_from_slice(batch))
        .on_stderr(move |batch| err.lock().unwrap().extend_from_slice(batch));
    (executor, stdout, stderr)
}

fn sh(script: &str) -> ProcessSpec {
    ProcessSpec::new("/bin/sh").arguments(format!("-c {}", shlex::try_quote(script).unwrap()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_echo_hello() {
    let (mut executor, stdout, stderr) = collecting_executor(ProcessConfig::default());
    let code = executor
        .run(ProcessSpec::new("echo").arguments("hello"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(code, 0);
    assert_eq!(*stdout.lock().unwrap(), vec!["hello".to_string()]);
    assert!(stderr.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lines_arrive_in_order_per_stream() {
    let (mut executor, stdout, stderr) = collecting_executor(ProcessConfig::default());
    let script = "i=1; while [ $i -le 500 ]; do echo out$i; echo err$i 1>&2; i=$((i+1)); done";
    executor.run(sh(script), &CancellationToken::new()).await.unwrap();

    let expected_out: Vec<String> = (1..=500).map(|i| format!("out{}", i)).collect();
    let expected_err: Vec<String> = (1..=500).map(|i| format!("err{}", i)).collect();
    assert_eq!(*stdout.lock().unwrap(), expected_out);
    assert_eq!(*stderr.lock().unwrap(), expected_err);
}

#[tokio::test]
async fn test_second_run_fails() {
    let mut executor = ProcessExecutor::default();
    let token = CancellationToken::new();
    executor.run(ProcessSpec::new("true"), &token).await.unwrap();

    let second = executor.run(ProcessSpec::new("true"), &token).await;
    assert!(matches!(second, Err(ProcessError::AlreadyStarted)));
}

#[tokio::test]
async fn test_non_zero_exit_is_returned_when_not_required() {
    let mut executor = ProcessExecutor::default();
    let code = executor
        .run(sh("exit 3"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(code, 3);
}

#[tokio::test]
async fn test_required_zero_exit_violation() {
    let mut executor = ProcessExecutor::default();
    let result = executor
        .run(
            sh("echo failing; exit 2").require_exit_code_zero(true),
            &CancellationToken::new(),
        )
        .await;

    match result {
        Err(ProcessError::ExitCode { exit_code, program, .. }) => {
            assert_eq!(exit_code, 2);
            assert_eq!(program, "/bin/sh");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_stdin_lines_are_written_then_closed() {
    let (mut executor, stdout, _) = collecting_executor(ProcessConfig::default());
    let spec = ProcessSpec::new("cat").stdin_line("{\"a\":1}").stdin_line("second");
    executor.run(spec, &CancellationToken::new()).await.unwrap();
    assert_eq!(*stdout.lock().unwrap(), vec!["{\"a\":1}", "second"]);
}

#[tokio::test]
async fn test_environment_overlay_and_marker() {
    let (mut executor, stdout, _) = collecting_executor(ProcessConfig::default());
    let spec = sh("echo $AGENT_SAMPLE_VAR:$TFSBUILD").env("AGENT_SAMPLE_VAR", "sample");
    executor.run(spec, &CancellationToken::new()).await.unwrap();
    assert_eq!(*stdout.lock().unwrap(), vec!["sample:True"]);
}

#[tokio::test]
async fn test_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().canonicalize().unwrap();
    let (mut executor, stdout, _) = collecting_executor(ProcessConfig::default());
    executor
        .run(sh("pwd -P").working_directory(&canonical), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        *stdout.lock().unwrap(),
        vec![canonical.to_string_lossy().to_string()]
    );
}

#[tokio::test]
async fn test_missing_program_is_spawn_error() {
    let mut executor = ProcessExecutor::default();
    let result = executor
        .run(ProcessSpec::new("/no/such/agent/tool"), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(ProcessError::Spawn { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_kill_on_cancel_is_immediate() {
    let (mut executor, stdout, _) = collecting_executor(ProcessConfig::default());
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = executor
        .run(
            sh("trap '' INT TERM; echo ready; exec sleep 30").kill_on_cancel(true),
            &token,
        )
        .await;

    assert!(matches!(result, Err(ProcessError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(*stdout.lock().unwrap(), vec!["ready"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_graceful_interrupt_is_honoured() {
    let (mut executor, stdout, _) = collecting_executor(ProcessConfig::default());
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let script = "trap 'echo interrupted; exit 130' INT; echo ready; while :; do sleep 0.1; done";
    let result = executor.run(sh(script), &token).await;

    assert!(matches!(result, Err(ProcessError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(*stdout.lock().unwrap(), vec!["ready", "interrupted"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_escalation_reaches_kill_with_short_timeouts() {
    let config = ProcessConfig {
        interrupt_timeout: Duration::from_secs(1),
        terminate_timeout: Duration::from_secs(1),
        ..ProcessConfig::default()
    };
    let (mut executor, stdout, _) = collecting_executor(config);
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let script = "trap '' INT TERM; echo stubborn; while :; do sleep 0.1; done";
    let result = executor.run(sh(script), &token).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(ProcessError::Cancelled)));
    assert!(elapsed >= Duration::from_secs(2), "escalated too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "escalation too slow: {:?}", elapsed);
    assert_eq!(*stdout.lock().unwrap(), vec!["stubborn"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "takes the full default escalation window of about 15 seconds"]
async fn test_signal_ignoring_process_is_gone_within_default_window() {
    let mut executor = ProcessExecutor::default();
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = executor
        .run(sh("trap '' INT TERM; while :; do sleep 0.1; done"), &token)
        .await;

    assert!(matches!(result, Err(ProcessError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(17));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drain_watchdog_bounds_inherited_pipes() {
    let config = ProcessConfig {
        stream_drain_timeout: Duration::from_secs(1),
        ..ProcessConfig::default()
    };
    let (mut executor, stdout, _) = collecting_executor(config);

    let started = Instant::now();
    // the background sleep keeps stdout open after the shell exits
    let code = executor
        .run(sh("echo parent; sleep 6 & exit 0"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(code, 0);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(*stdout.lock().unwrap(), vec!["parent"]);
}

/// Refuses graceful signals and records every call
struct NoGracefulSignals {
    inner: Box<dyn ProcessControl>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl ProcessControl for NoGracefulSignals {
    fn interrupt(&self, _pid: u32) -> std::io::Result<()> {
        self.calls.lock().unwrap().push("interrupt");
        Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
    }

    fn terminate(&self, _pid: u32) -> std::io::Result<()> {
        self.calls.lock().unwrap().push("terminate");
        Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
    }

    fn kill_tree(&self, pid: u32) {
        self.calls.lock().unwrap().push("kill_tree");
        self.inner.kill_tree(pid);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_undeliverable_signals_escalate_without_waiting() {
    let calls: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    let mut executor = ProcessExecutor::default().with_control(Box::new(NoGracefulSignals {
        inner: platform_control(),
        calls: calls.clone(),
    }));

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let result = executor.run(sh("exec sleep 30"), &token).await;
    assert!(matches!(result, Err(ProcessError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(*calls.lock().unwrap(), vec!["interrupt", "terminate", "kill_tree"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_drain_watchdog_sends_no_signal() {
    let calls: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    let config = ProcessConfig {
        stream_drain_timeout: Duration::from_secs(1),
        ..ProcessConfig::default()
    };
    let mut executor = ProcessExecutor::new(config).with_control(Box::new(NoGracefulSignals {
        inner: platform_control(),
        calls: calls.clone(),
    }));

    let started = Instant::now();
    let code = executor
        .run(sh("sleep 7 & exit 0"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(code, 0);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(calls.lock().unwrap().is_empty(), "signalled: {:?}", calls.lock().unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_signal_ignoring_grandchild_does_not_hold_cancellation() {
    let config = ProcessConfig {
        interrupt_timeout: Duration::from_secs(1),
        terminate_timeout: Duration::from_secs(1),
        stream_drain_timeout: Duration::from_secs(1),
        ..ProcessConfig::default()
    };
    let (mut executor, stdout, _) = collecting_executor(config);
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });

    // not exec'd: the sleep inherits the ignored signals and the pipes
    let started = Instant::now();
    let result = executor
        .run(sh("trap '' INT TERM; echo ready; sleep 30"), &token)
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(ProcessError::Cancelled)));
    assert!(elapsed < Duration::from_secs(6), "cancellation too slow: {:?}", elapsed);
    assert_eq!(*stdout.lock().unwrap(), vec!["ready"]);
}
