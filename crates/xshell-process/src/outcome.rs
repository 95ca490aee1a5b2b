//! Terminal outcome of a process run

use std::process::ExitStatus;
use std::time::Duration;

use crate::error::ProcessError;

/// The single final result of a run
///
/// Exactly one of exit code, timeout or error is ever present.
#[derive(Debug, Clone)]
pub enum ExitOutcome {
    /// The process exited on its own with this code
    Exited(i32),
    /// The wait bound elapsed; the process was killed
    TimedOut(Duration),
    /// The run failed before an exit code could be observed
    Failed(ProcessError),
}

impl ExitOutcome {
    /// Exit code, present only for [`ExitOutcome::Exited`]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExitOutcome::Exited(code) => Some(*code),
            _ => None,
        }
    }

    /// Whether the run ended because the wait bound elapsed
    pub fn terminated_by_timeout(&self) -> bool {
        matches!(self, ExitOutcome::TimedOut(_))
    }

    /// Error, present only for [`ExitOutcome::Failed`]
    pub fn error(&self) -> Option<&ProcessError> {
        match self {
            ExitOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// True for a zero exit code
    pub fn success(&self) -> bool {
        self.exit_code() == Some(0)
    }

    /// Express the outcome as a `Result`, mapping timeouts to [`ProcessError::Timeout`]
    pub fn into_result(self) -> Result<i32, ProcessError> {
        match self {
            ExitOutcome::Exited(code) => Ok(code),
            ExitOutcome::TimedOut(after) => Err(ProcessError::Timeout {
                millis: whole_millis(after),
            }),
            ExitOutcome::Failed(err) => Err(err),
        }
    }
}

/// Milliseconds in `duration`, saturating at `u64::MAX`
pub(crate) fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Map an OS exit status to an integer code
///
/// Signal deaths on Unix become `128 + signal`; a missing code elsewhere is `-1`.
pub fn exit_code_of(status: ExitStatus) -> i32 {
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
