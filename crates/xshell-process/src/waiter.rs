//! Process waiter - bounded, abandonable wait for child exit

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tracing::debug;

use crate::outcome::{exit_code_of, whole_millis};

/// Result of a bounded wait
#[derive(Debug)]
pub enum WaitResult {
    /// The process exited within the bound
    Exited(ExitStatus),
    /// The bound elapsed first; the process is still running
    Elapsed,
    /// Waiting itself failed
    Failed(io::Error),
}

/// Blocks the supervising task until the child exits
///
/// Abandoning the wait drops the pending `wait()` future; the child itself is
/// left untouched. Killing is the caller's decision.
pub struct ProcessWaiter<'a> {
    child: &'a mut Child,
    pid: Option<u32>,
}

impl<'a> ProcessWaiter<'a> {
    /// Wrap a spawned child
    pub fn new(child: &'a mut Child) -> Self {
        let pid = child.id();
        Self { child, pid }
    }

    /// Process ID, if the child had not been reaped when the waiter was created
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait with no bound
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.log_exit(status);
        Ok(status)
    }

    /// Wait for at most `bound` (None = indefinitely)
    pub async fn wait_for(&mut self, bound: Option<Duration>) -> WaitResult {
        let waited = match bound {
            None => self.child.wait().await,
            Some(bound) => match tokio::time::timeout(bound, self.child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    debug!(pid = ?self.pid, bound_ms = whole_millis(bound), "Wait abandoned");
                    return WaitResult::Elapsed;
                }
            },
        };

        match waited {
            Ok(status) => {
                self.log_exit(status);
                WaitResult::Exited(status)
            }
            Err(e) => WaitResult::Failed(e),
        }
    }

    fn log_exit(&self, status: ExitStatus) {
        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;
            use std::os::unix::process::ExitStatusExt;

            if let Some(raw) = status.signal() {
                let name = Signal::try_from(raw)
                    .map(|s| s.as_str())
                    .unwrap_or("unknown");
                debug!(pid = ?self.pid, signal = name, "Process terminated by signal");
                return;
            }
        }

        debug!(pid = ?self.pid, code = exit_code_of(status), "Process exited");
    }
}
