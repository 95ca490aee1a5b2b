//! Status callbacks and the event-channel adapter
//!
//! Callbacks are invoked from the runner's own tasks, never from the thread
//! that called `start`. Implementations must be `Send + Sync` and do their own
//! marshaling if they need to reach a UI thread.
//!
//! Ordering: chunks for a stream are delivered in byte order. On a normal exit
//! `on_exit` fires after the pumps finished draining or after the drain grace
//! elapsed, whichever comes first. On timeout `on_exit` fires right after the
//! kill, and chunks already in flight may still arrive after it. Treat this as
//! best-effort ordering, not a guarantee.

use tokio::sync::mpsc;

use crate::outcome::ExitOutcome;

/// Receives lifecycle events for one run
pub trait StatusCallback: Send + Sync {
    /// Process spawned with this pid
    fn on_start(&self, _pid: u32) {}

    /// A chunk of stdout (or merged stdout+stderr); chunk boundaries are arbitrary
    fn on_stdout(&self, _chunk: &[u8]) {}

    /// A chunk of stderr; never called when streams are merged
    fn on_stderr(&self, _chunk: &[u8]) {}

    /// Terminal outcome, called exactly once per run
    fn on_exit(&self, _outcome: &ExitOutcome) {}
}

/// Callback that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallback;

impl StatusCallback for NoopCallback {}

/// One event of a run, as delivered through [`ChannelCallback`]
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// Process spawned
    Started { pid: u32 },
    /// Stdout chunk
    Stdout(Vec<u8>),
    /// Stderr chunk
    Stderr(Vec<u8>),
    /// Terminal outcome
    Exit(ExitOutcome),
}

impl ProcessEvent {
    /// Check if this is the terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessEvent::Exit(_))
    }
}

/// Receiving side of a run's event stream
pub type EventReceiver = mpsc::UnboundedReceiver<ProcessEvent>;

/// Forwards every callback as a [`ProcessEvent`] into an unbounded channel
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelCallback {
    tx: mpsc::UnboundedSender<ProcessEvent>,
}

impl ChannelCallback {
    /// Create the callback and its receiver
    pub fn new() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ProcessEvent) {
        let _ = self.tx.send(event);
    }
}

impl StatusCallback for ChannelCallback {
    fn on_start(&self, pid: u32) {
        self.send(ProcessEvent::Started { pid });
    }

    fn on_stdout(&self, chunk: &[u8]) {
        self.send(ProcessEvent::Stdout(chunk.to_vec()));
    }

    fn on_stderr(&self, chunk: &[u8]) {
        self.send(ProcessEvent::Stderr(chunk.to_vec()));
    }

    fn on_exit(&self, outcome: &ExitOutcome) {
        self.send(ProcessEvent::Exit(outcome.clone()));
    }
}
