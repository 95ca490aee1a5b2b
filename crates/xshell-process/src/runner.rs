//! Process runner - spawn, stream, wait, report
//!
//! One [`ProcessRunner`] supervises at most one process at a time. `start`
//! returns immediately; spawning, pumping and waiting happen on a tokio task
//! that owns the child and a `JoinSet` of stream pumps.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::callback::{ChannelCallback, EventReceiver, StatusCallback};
use crate::config::{ProcessSpec, RunnerOptions};
use crate::error::{ProcessError, Result, StreamKind};
use crate::outcome::{exit_code_of, whole_millis, ExitOutcome};
use crate::pump::{ChunkSink, PumpReport, StreamPump};
use crate::spawn::{spawn_child, BoxedReader, SpawnedChild};
use crate::waiter::{ProcessWaiter, WaitResult};

/// Lifecycle state of the runner
///
/// Terminal states (`Completed`, `TimedOut`, `Failed`) behave like `Idle` for
/// the purpose of starting a new run; they are kept so the last result can be
/// queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has run yet
    Idle,
    /// `start` accepted the run; spawn pending
    Starting,
    /// Process spawned and being supervised
    Running,
    /// Process exited on its own
    Completed,
    /// Wait bound elapsed and the process was killed
    TimedOut,
    /// Spawn or wait failed
    Failed,
}

impl RunState {
    /// True for `Starting` and `Running`
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Starting | RunState::Running)
    }

    /// True for `Completed`, `TimedOut` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::TimedOut | RunState::Failed
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Status {
    run_id: u64,
    state: RunState,
    exit_code: Option<i32>,
}

#[derive(Debug)]
struct Shared {
    busy: AtomicBool,
    next_run_id: AtomicU64,
    status: Mutex<Status>,
}

impl Shared {
    fn set_state(&self, run_id: u64, state: RunState) {
        debug_assert!(state.is_active());
        let mut status = self.status.lock();
        if status.run_id == run_id {
            status.state = state;
        }
    }

    fn commit(&self, run_id: u64, state: RunState, exit_code: Option<i32>) {
        debug_assert!(state.is_terminal());
        let mut status = self.status.lock();
        if status.run_id == run_id {
            status.state = state;
            status.exit_code = exit_code;
        }
    }
}

/// Ownership token for one accepted run
#[derive(Debug)]
pub struct RunHandle {
    run_id: u64,
    outcome: oneshot::Receiver<ExitOutcome>,
}

impl RunHandle {
    /// Sequence number of this run on its runner (starting at 1)
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Wait for the terminal outcome, the same value passed to `on_exit`
    pub async fn wait(self) -> ExitOutcome {
        self.outcome
            .await
            .unwrap_or(ExitOutcome::Failed(ProcessError::Interrupted))
    }
}

/// Spawns and supervises external processes, one at a time
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shared: Arc<Shared>,
    options: RunnerOptions,
    handle: Option<Handle>,
}

impl ProcessRunner {
    /// Create a runner with default options
    pub fn new() -> Self {
        Self::with_options(RunnerOptions::default())
    }

    /// Create a runner with custom options
    pub fn with_options(options: RunnerOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                busy: AtomicBool::new(false),
                next_run_id: AtomicU64::new(0),
                status: Mutex::new(Status {
                    run_id: 0,
                    state: RunState::Idle,
                    exit_code: None,
                }),
            }),
            options,
            handle: None,
        }
    }

    /// Supervise runs on this runtime instead of the caller's current one
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Runner options
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.shared.status.lock().state
    }

    /// Whether a run is in flight
    pub fn is_running(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    /// Exit code of the last run
    ///
    /// Fails with [`ProcessError::NotTerminated`] unless the last run is
    /// `Completed`.
    pub fn exit_code(&self) -> Result<i32> {
        let status = *self.shared.status.lock();
        match (status.state, status.exit_code) {
            (RunState::Completed, Some(code)) => Ok(code),
            (state, _) => Err(ProcessError::NotTerminated { state }),
        }
    }

    /// Start a run without blocking
    ///
    /// Fails synchronously with [`ProcessError::AlreadyRunning`] while another
    /// run is in flight, or [`ProcessError::NoRuntime`] when there is no tokio
    /// runtime to host the supervisor. Every other failure, including spawn
    /// errors, is reported once through `on_exit` and the returned handle.
    ///
    /// Without a callback both streams are still drained and discarded.
    pub fn start(
        &self,
        spec: ProcessSpec,
        callback: Option<Arc<dyn StatusCallback>>,
    ) -> Result<RunHandle> {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| ProcessError::NoRuntime)?,
        };

        if self
            .shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rejecting start while a run is in flight");
            return Err(ProcessError::AlreadyRunning);
        }

        let run_id = self.shared.next_run_id.fetch_add(1, Ordering::Relaxed) + 1;
        *self.shared.status.lock() = Status {
            run_id,
            state: RunState::Starting,
            exit_code: None,
        };

        let (tx, rx) = oneshot::channel();
        let supervisor = Supervisor {
            shared: Arc::clone(&self.shared),
            run_id,
            callback,
            reply: Some(tx),
            started: Instant::now(),
        };

        let span = info_span!("process", run_id);
        handle.spawn(supervisor.run(spec, self.options).instrument(span));

        Ok(RunHandle {
            run_id,
            outcome: rx,
        })
    }

    /// Start a run and receive its events through a channel
    pub fn start_with_events(&self, spec: ProcessSpec) -> Result<(RunHandle, EventReceiver)> {
        let (callback, rx) = ChannelCallback::new();
        let handle = self.start(spec, Some(Arc::new(callback)))?;
        Ok((handle, rx))
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// State owned by the supervising task of one run
///
/// Dropping it before an outcome was reported (runtime shutdown, task
/// cancellation) is handled like a timeout: `kill_on_drop` takes the child
/// down and the outcome is reported from `Drop`.
struct Supervisor {
    shared: Arc<Shared>,
    run_id: u64,
    callback: Option<Arc<dyn StatusCallback>>,
    reply: Option<oneshot::Sender<ExitOutcome>>,
    started: Instant,
}

impl Supervisor {
    async fn run(mut self, spec: ProcessSpec, options: RunnerOptions) {
        let spawned = match spawn_child(&spec) {
            Ok(spawned) => spawned,
            Err(err) => {
                warn!(error = %err, "Process could not be started");
                self.finish(RunState::Failed, ExitOutcome::Failed(err));
                return;
            }
        };

        let SpawnedChild {
            mut child,
            pid,
            stdout,
            stderr,
            stderr_to_stdout,
        } = spawned;

        info!(pid, program = ?spec.program(), "Process spawned");
        self.shared.set_state(self.run_id, RunState::Running);
        if let Some(callback) = &self.callback {
            callback.on_start(pid);
        }

        let mut pumps = JoinSet::new();
        if let Some(reader) = stdout {
            self.spawn_pump(&mut pumps, reader, StreamKind::Stdout, StreamKind::Stdout, options);
        }
        if let Some(reader) = stderr {
            let target = if stderr_to_stdout {
                StreamKind::Stdout
            } else {
                StreamKind::Stderr
            };
            self.spawn_pump(&mut pumps, reader, StreamKind::Stderr, target, options);
        }

        let bound = spec.timeout_bound();
        let waited = ProcessWaiter::new(&mut child).wait_for(bound).await;

        match waited {
            WaitResult::Exited(status) => {
                let code = exit_code_of(status);
                drain(&mut pumps, options.drain_grace).await;
                info!(pid, code, "Process exited");
                self.finish(RunState::Completed, ExitOutcome::Exited(code));
            }
            WaitResult::Elapsed => {
                let bound = bound.unwrap_or_default();
                warn!(
                    pid,
                    timeout_ms = whole_millis(bound),
                    "Process timed out, killing"
                );
                if let Err(e) = child.kill().await {
                    warn!(pid, error = %e, "Failed to kill timed out process");
                }
                // Pumps see EOF once the pipes close; they are not joined here.
                pumps.detach_all();
                self.finish(RunState::TimedOut, ExitOutcome::TimedOut(bound));
            }
            WaitResult::Failed(e) => {
                warn!(pid, error = %e, "Waiting for process failed, killing");
                if let Err(e) = child.kill().await {
                    warn!(pid, error = %e, "Failed to kill process");
                }
                pumps.detach_all();
                self.finish(
                    RunState::Failed,
                    ExitOutcome::Failed(ProcessError::Wait(Arc::new(e))),
                );
            }
        }
    }

    fn spawn_pump(
        &self,
        pumps: &mut JoinSet<PumpReport>,
        reader: BoxedReader,
        source: StreamKind,
        target: StreamKind,
        options: RunnerOptions,
    ) {
        let pump = StreamPump::new(reader, source)
            .buffer_size(options.buffer_size)
            .with_optional_sink(self.sink_for(target));
        let span = info_span!("reader", stream = %source);
        pumps.spawn(pump.run().instrument(span));
    }

    fn sink_for(&self, target: StreamKind) -> Option<ChunkSink> {
        let callback = Arc::clone(self.callback.as_ref()?);
        let sink: ChunkSink = match target {
            StreamKind::Stdout => Box::new(move |chunk: &[u8]| callback.on_stdout(chunk)),
            StreamKind::Stderr => Box::new(move |chunk: &[u8]| callback.on_stderr(chunk)),
        };
        Some(sink)
    }

    /// Commit the terminal state, release the guard, then report
    fn finish(&mut self, state: RunState, outcome: ExitOutcome) {
        let Some(reply) = self.reply.take() else {
            return;
        };

        self.shared.commit(self.run_id, state, outcome.exit_code());
        self.shared.busy.store(false, Ordering::Release);

        debug!(
            state = ?state,
            elapsed_ms = whole_millis(self.started.elapsed()),
            "Run finished"
        );

        if let Some(callback) = &self.callback {
            callback.on_exit(&outcome);
        }
        let _ = reply.send(outcome);
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if self.reply.is_some() {
            warn!(run_id = self.run_id, "Supervision interrupted, process destroyed");
            let elapsed = self.started.elapsed();
            self.finish(RunState::TimedOut, ExitOutcome::TimedOut(elapsed));
        }
    }
}

/// Let pumps finish draining, but never longer than `grace`
async fn drain(pumps: &mut JoinSet<PumpReport>, grace: Duration) {
    let joined = tokio::time::timeout(grace, async {
        while let Some(joined) = pumps.join_next().await {
            match joined {
                Ok(report) => debug!(
                    stream = %report.stream,
                    bytes = report.bytes,
                    eof = report.reached_eof(),
                    "Pump joined"
                ),
                Err(e) => warn!(error = %e, "Pump task failed"),
            }
        }
    })
    .await;

    if joined.is_err() {
        debug!(
            remaining = pumps.len(),
            grace_ms = whole_millis(grace),
            "Drain grace elapsed, detaching pumps"
        );
        pumps.detach_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_runner_is_idle() {
        let runner = ProcessRunner::new();
        assert_eq!(runner.state(), RunState::Idle);
        assert!(!runner.is_running());
        assert!(matches!(
            runner.exit_code(),
            Err(ProcessError::NotTerminated {
                state: RunState::Idle
            })
        ));
    }

    #[test]
    fn start_without_runtime_fails_and_keeps_guard_free() {
        let runner = ProcessRunner::new();
        let spec = ProcessSpec::builder().command(["true"]).build();

        let err = runner.start(spec, None).unwrap_err();
        assert!(matches!(err, ProcessError::NoRuntime));
        assert!(!runner.is_running());
        assert_eq!(runner.state(), RunState::Idle);
    }

    #[test]
    fn state_classification() {
        assert!(RunState::Starting.is_active());
        assert!(RunState::Running.is_active());
        assert!(!RunState::Idle.is_active());
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::TimedOut.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn echo_completes_with_zero() {
        let runner = ProcessRunner::new();
        let spec = ProcessSpec::builder().command(["echo", "hi"]).build();

        let (handle, mut events) = runner.start_with_events(spec).unwrap();
        assert_eq!(handle.run_id(), 1);

        let mut stdout = Vec::new();
        let mut exit = None;
        while let Some(event) = events.recv().await {
            match event {
                crate::ProcessEvent::Stdout(chunk) => stdout.extend(chunk),
                crate::ProcessEvent::Exit(outcome) => {
                    exit = Some(outcome);
                    break;
                }
                _ => {}
            }
        }

        assert_eq!(stdout, b"hi\n");
        assert_eq!(exit.and_then(|o| o.exit_code()), Some(0));
        assert_eq!(handle.wait().await.exit_code(), Some(0));
        assert_eq!(runner.exit_code().unwrap(), 0);
        assert_eq!(runner.state(), RunState::Completed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let runner = ProcessRunner::new();
        let slow = ProcessSpec::builder().command(["sleep", "0.3"]).build();

        let first = runner.start(slow.clone(), None).unwrap();
        assert!(runner.is_running());
        assert!(matches!(
            runner.start(slow, None),
            Err(ProcessError::AlreadyRunning)
        ));

        assert_eq!(first.wait().await.exit_code(), Some(0));
        assert!(!runner.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runner_is_reusable_after_a_run() {
        let runner = ProcessRunner::new();

        let first = runner
            .start(ProcessSpec::builder().command(["false"]).build(), None)
            .unwrap();
        assert_eq!(first.wait().await.exit_code(), Some(1));

        let second = runner
            .start(ProcessSpec::builder().command(["true"]).build(), None)
            .unwrap();
        assert_eq!(second.run_id(), 2);
        assert_eq!(second.wait().await.exit_code(), Some(0));
        assert_eq!(runner.exit_code().unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_command_reports_configuration_error() {
        let runner = ProcessRunner::new();
        let outcome = runner
            .start(ProcessSpec::builder().build(), None)
            .unwrap()
            .wait()
            .await;

        assert!(matches!(
            outcome.error(),
            Some(ProcessError::Configuration(_))
        ));
        assert_eq!(runner.state(), RunState::Failed);
        assert!(runner.exit_code().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_process() {
        let runner = ProcessRunner::new();
        let spec = ProcessSpec::builder()
            .command(["sleep", "30"])
            .timeout(Duration::from_millis(200))
            .build();

        let started = Instant::now();
        let outcome = runner.start(spec, None).unwrap().wait().await;

        assert!(outcome.terminated_by_timeout());
        assert_eq!(outcome.exit_code(), None);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(runner.state(), RunState::TimedOut);
        assert!(matches!(
            runner.exit_code(),
            Err(ProcessError::NotTerminated {
                state: RunState::TimedOut
            })
        ));
    }
}
