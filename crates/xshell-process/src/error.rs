//! Error types for process execution

use std::io;
use std::sync::Arc;
use thiserror::Error;

use crate::runner::RunState;

/// Which of the child's output streams a pump was attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Standard output (also carries stderr when streams are merged)
    Stdout,
    /// Standard error
    Stderr,
}

impl StreamKind {
    /// Short lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process execution errors
///
/// I/O sources are shared behind `Arc` so that errors, and the
/// [`ExitOutcome`](crate::ExitOutcome) values carrying them, can be cloned.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// Invalid process specification (empty command, empty program name)
    #[error("Invalid process configuration: {0}")]
    Configuration(String),

    /// The OS refused to create the process
    #[error("Failed to spawn process '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// Reading one of the child's streams failed
    #[error("Failed to read {stream}: {source}")]
    Io {
        stream: StreamKind,
        #[source]
        source: Arc<io::Error>,
    },

    /// Waiting for the child failed at the OS level
    #[error("Failed to wait for process: {0}")]
    Wait(#[source] Arc<io::Error>),

    /// The supervising task ended without reporting an outcome
    #[error("Process supervision was interrupted")]
    Interrupted,

    /// The wait bound elapsed before the process exited
    #[error("Process timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// `start` was called while a run is still in flight
    #[error("Process is already running")]
    AlreadyRunning,

    /// The exit code was queried before the run completed
    #[error("Process has not terminated (state: {state:?})")]
    NotTerminated { state: RunState },

    /// No tokio runtime is available to host the supervising task
    #[error("No tokio runtime available to supervise the process")]
    NoRuntime,
}

impl ProcessError {
    /// Build a spawn error from the OS error
    pub(crate) fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        ProcessError::Spawn {
            program: program.into(),
            source: Arc::new(source),
        }
    }

    /// Build a stream read error
    pub(crate) fn io(stream: StreamKind, source: io::Error) -> Self {
        ProcessError::Io {
            stream,
            source: Arc::new(source),
        }
    }
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;
