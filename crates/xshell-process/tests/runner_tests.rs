//! End-to-end tests for ProcessRunner against real processes

#![cfg(unix)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use xshell_process::{
    ExitOutcome, ProcessError, ProcessRunner, ProcessSpec, RunState, RunnerOptions,
    StatusCallback, TextCallback, TextSink,
};

#[derive(Default)]
struct Recorder {
    pid: Mutex<Option<u32>>,
    stdout: Mutex<Vec<u8>>,
    stderr: Mutex<Vec<u8>>,
    stdout_chunks: AtomicU32,
    stderr_chunks: AtomicU32,
    exits: Mutex<Vec<ExitOutcome>>,
}

impl Recorder {
    fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout.lock().unwrap()).into_owned()
    }

    fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr.lock().unwrap()).into_owned()
    }

    fn exit_count(&self) -> usize {
        self.exits.lock().unwrap().len()
    }
}

impl StatusCallback for Recorder {
    fn on_start(&self, pid: u32) {
        *self.pid.lock().unwrap() = Some(pid);
    }

    fn on_stdout(&self, chunk: &[u8]) {
        self.stdout_chunks.fetch_add(1, Ordering::SeqCst);
        self.stdout.lock().unwrap().extend_from_slice(chunk);
    }

    fn on_stderr(&self, chunk: &[u8]) {
        self.stderr_chunks.fetch_add(1, Ordering::SeqCst);
        self.stderr.lock().unwrap().extend_from_slice(chunk);
    }

    fn on_exit(&self, outcome: &ExitOutcome) {
        self.exits.lock().unwrap().push(outcome.clone());
    }
}

async fn run_recorded(runner: &ProcessRunner, spec: ProcessSpec) -> (Arc<Recorder>, ExitOutcome) {
    let recorder = Arc::new(Recorder::default());
    let callback: Arc<dyn StatusCallback> = recorder.clone();
    let outcome = runner.start(spec, Some(callback)).unwrap().wait().await;
    (recorder, outcome)
}

fn sh(script: &str) -> ProcessSpec {
    ProcessSpec::builder().command(["sh", "-c", script]).build()
}

#[tokio::test]
async fn echo_streams_output_then_exits_zero() {
    let runner = ProcessRunner::new();
    let spec = ProcessSpec::builder().command(["echo", "hi"]).build();

    let (recorder, outcome) = run_recorded(&runner, spec).await;

    assert_eq!(recorder.stdout_text(), "hi\n");
    assert_eq!(outcome.exit_code(), Some(0));
    assert_eq!(recorder.exit_count(), 1);
    assert_eq!(runner.exit_code().unwrap(), 0);
    assert!(recorder.pid.lock().unwrap().is_some());
}

#[tokio::test]
async fn false_exits_one_without_output() {
    let runner = ProcessRunner::new();
    let spec = ProcessSpec::builder().command(["false"]).build();

    let (recorder, outcome) = run_recorded(&runner, spec).await;

    assert_eq!(outcome.exit_code(), Some(1));
    assert_eq!(recorder.stdout_chunks.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.stderr_chunks.load(Ordering::SeqCst), 0);
    assert_eq!(runner.exit_code().unwrap(), 1);
}

#[tokio::test]
async fn nonexistent_executable_reports_spawn_error() {
    let runner = ProcessRunner::new();
    let spec = ProcessSpec::builder()
        .command(["/nonexistent/xshell-missing-binary", "--flag"])
        .build();

    let (recorder, outcome) = run_recorded(&runner, spec).await;

    assert!(matches!(outcome.error(), Some(ProcessError::Spawn { .. })));
    assert!(recorder.pid.lock().unwrap().is_none());
    assert_eq!(recorder.stdout_chunks.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.exit_count(), 1);
    assert_eq!(runner.state(), RunState::Failed);
    assert!(!runner.is_running());
}

#[tokio::test]
async fn bad_working_directory_reports_spawn_error() {
    let runner = ProcessRunner::new();
    let spec = ProcessSpec::builder()
        .command(["true"])
        .working_dir("/nonexistent/xshell-missing-dir")
        .build();

    let (_, outcome) = run_recorded(&runner, spec).await;

    assert!(matches!(outcome.error(), Some(ProcessError::Spawn { .. })));
}

#[tokio::test]
async fn timeout_kills_the_child() {
    let runner = ProcessRunner::new();
    let timeout = Duration::from_millis(300);
    let spec = ProcessSpec::builder()
        .command(["sleep", "30"])
        .timeout(timeout)
        .build();

    let started = Instant::now();
    let (recorder, outcome) = run_recorded(&runner, spec).await;
    let elapsed = started.elapsed();

    assert!(outcome.terminated_by_timeout());
    assert_eq!(outcome.exit_code(), None);
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_secs(3));
    assert_eq!(recorder.exit_count(), 1);

    let pid = recorder.pid.lock().unwrap().expect("process was spawned");
    let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None::<nix::sys::signal::Signal>);
    assert_eq!(alive, Err(nix::errno::Errno::ESRCH));
}

#[tokio::test]
async fn zero_timeout_waits_for_natural_exit() {
    let runner = ProcessRunner::new();
    let spec = ProcessSpec::builder()
        .command(["sh", "-c", "sleep 0.5; exit 7"])
        .timeout(Duration::ZERO)
        .build();

    let (_, outcome) = run_recorded(&runner, spec).await;

    assert_eq!(outcome.exit_code(), Some(7));
    assert!(!outcome.terminated_by_timeout());
}

#[tokio::test]
async fn second_start_does_not_disturb_running_process() {
    let runner = ProcessRunner::new();
    let recorder = Arc::new(Recorder::default());
    let callback: Arc<dyn StatusCallback> = recorder.clone();

    let handle = runner
        .start(sh("sleep 0.2; echo done"), Some(callback))
        .unwrap();

    let rejected = runner.start(sh("echo intruder"), None);
    assert!(matches!(rejected, Err(ProcessError::AlreadyRunning)));

    let outcome = handle.wait().await;
    assert_eq!(outcome.exit_code(), Some(0));
    assert_eq!(recorder.stdout_text(), "done\n");
    assert_eq!(recorder.exit_count(), 1);
}

#[tokio::test]
async fn merged_streams_route_stderr_to_stdout() {
    let runner = ProcessRunner::new();
    let spec = ProcessSpec::builder()
        .command(["sh", "-c", "echo one; echo two >&2; echo three"])
        .redirect_error_stream(true)
        .build();

    let (recorder, outcome) = run_recorded(&runner, spec).await;

    assert_eq!(outcome.exit_code(), Some(0));
    assert_eq!(recorder.stdout_text(), "one\ntwo\nthree\n");
    assert_eq!(recorder.stderr_chunks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn separate_streams_are_delivered_independently() {
    let runner = ProcessRunner::new();
    let spec = sh("echo out; echo err >&2");

    let (recorder, outcome) = run_recorded(&runner, spec).await;

    assert_eq!(outcome.exit_code(), Some(0));
    assert_eq!(recorder.stdout_text(), "out\n");
    assert_eq!(recorder.stderr_text(), "err\n");
}

#[tokio::test]
async fn large_stdout_arrives_complete_and_in_order() {
    let runner = ProcessRunner::new();
    let spec = ProcessSpec::builder().command(["seq", "1", "20000"]).build();

    let (recorder, outcome) = run_recorded(&runner, spec).await;

    let expected: String = (1..=20000).map(|n| format!("{n}\n")).collect();
    assert_eq!(outcome.exit_code(), Some(0));
    assert_eq!(recorder.stdout_text(), expected);
    assert!(recorder.stdout_chunks.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn output_is_drained_without_a_callback() {
    let runner = ProcessRunner::new();
    // Far more than a pipe buffer; the child would block if nobody read.
    let spec = ProcessSpec::builder()
        .command(["head", "-c", "2000000", "/dev/zero"])
        .timeout(Duration::from_secs(20))
        .build();

    let outcome = runner.start(spec, None).unwrap().wait().await;

    assert_eq!(outcome.exit_code(), Some(0));
}

#[tokio::test]
async fn environment_overlays_inherited_environment() {
    let runner = ProcessRunner::new();
    let spec = ProcessSpec::builder()
        .command(["sh", "-c", "printf '%s|%s' \"$XSHELL_OVERLAY\" \"${PATH:+inherited}\""])
        .env("XSHELL_OVERLAY", "first")
        .env("XSHELL_OVERLAY", "second")
        .build();

    let (recorder, _) = run_recorded(&runner, spec).await;

    assert_eq!(recorder.stdout_text(), "second|inherited");
}

#[tokio::test]
async fn working_directory_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().canonicalize().unwrap();
    let runner = ProcessRunner::new();
    let spec = ProcessSpec::builder()
        .command(["pwd", "-P"])
        .working_dir(dir.path())
        .build();

    let (recorder, _) = run_recorded(&runner, spec).await;

    assert_eq!(recorder.stdout_text().trim_end(), expected.to_str().unwrap());
}

#[tokio::test]
async fn signal_death_is_reported_as_128_plus_signal() {
    let runner = ProcessRunner::new();

    let (_, outcome) = run_recorded(&runner, sh("kill -9 $$")).await;

    assert_eq!(outcome.exit_code(), Some(137));
}

struct ExitCodeProbe {
    runner: ProcessRunner,
    seen: Mutex<Option<Result<i32, String>>>,
}

impl StatusCallback for ExitCodeProbe {
    fn on_exit(&self, _outcome: &ExitOutcome) {
        let code = self.runner.exit_code().map_err(|e| e.to_string());
        *self.seen.lock().unwrap() = Some(code);
    }
}

#[tokio::test]
async fn exit_code_is_committed_before_on_exit() {
    let runner = ProcessRunner::new();
    let probe = Arc::new(ExitCodeProbe {
        runner: runner.clone(),
        seen: Mutex::new(None),
    });
    let callback: Arc<dyn StatusCallback> = probe.clone();

    let outcome = runner
        .start(sh("exit 3"), Some(callback))
        .unwrap()
        .wait()
        .await;

    assert_eq!(outcome.exit_code(), Some(3));
    assert_eq!(*probe.seen.lock().unwrap(), Some(Ok(3)));
}

#[tokio::test]
async fn drain_grace_bounds_exit_reporting() {
    // The background sleeper keeps the pipe open after the shell exits.
    let runner =
        ProcessRunner::with_options(RunnerOptions::default().drain_grace(Duration::from_millis(200)));
    let spec = sh("echo ready; sleep 5 &");

    let started = Instant::now();
    let (recorder, outcome) = run_recorded(&runner, spec).await;

    assert_eq!(outcome.exit_code(), Some(0));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(recorder.stdout_text(), "ready\n");
}

#[derive(Default)]
struct TextCollector {
    text: Mutex<String>,
}

impl TextSink for TextCollector {
    fn on_stdout_text(&self, text: &str) {
        self.text.lock().unwrap().push_str(text);
    }
}

#[tokio::test]
async fn text_callback_decodes_utf8_output() {
    let runner = ProcessRunner::with_options(RunnerOptions::default().buffer_size(1));
    let callback = Arc::new(TextCallback::new(TextCollector::default()));
    let dyn_callback: Arc<dyn StatusCallback> = callback.clone();

    let outcome = runner
        .start(sh("printf 'h\\303\\251llo \\342\\202\\254'"), Some(dyn_callback))
        .unwrap()
        .wait()
        .await;

    assert_eq!(outcome.exit_code(), Some(0));
    assert_eq!(*callback.sink().text.lock().unwrap(), "héllo €");
}

#[test]
fn runtime_shutdown_is_reported_like_a_timeout() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let runner = ProcessRunner::new().with_handle(rt.handle().clone());
    let recorder = Arc::new(Recorder::default());
    let callback: Arc<dyn StatusCallback> = recorder.clone();

    let handle = runner
        .start(ProcessSpec::builder().command(["sleep", "30"]).build(), Some(callback))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while recorder.pid.lock().unwrap().is_none() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(recorder.pid.lock().unwrap().is_some(), "process was never spawned");
    assert_eq!(runner.state(), RunState::Running);

    rt.shutdown_timeout(Duration::from_secs(2));

    assert_eq!(recorder.exit_count(), 1);
    assert!(recorder.exits.lock().unwrap()[0].terminated_by_timeout());
    assert!(!runner.is_running());
    assert_eq!(runner.state(), RunState::TimedOut);

    let waiter = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let outcome = waiter.block_on(handle.wait());
    assert!(outcome.terminated_by_timeout());
}
