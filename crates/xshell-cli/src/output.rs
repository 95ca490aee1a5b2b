// Output formatting and console forwarding

use std::io::Write;

use colored::Colorize;
use xshell_process::{ExitOutcome, StatusCallback};

use crate::logging::VerbosityLevel;

/// Output styling configuration
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stderr),
        }
    }
}

impl OutputStyle {
    /// Format error message
    pub fn error(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✗".red().bold(), msg)
        } else {
            format!("✗ {}", msg)
        }
    }

    /// Format warning message
    pub fn warning(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "⚠".yellow(), msg)
        } else {
            format!("⚠ {}", msg)
        }
    }

    /// Format info message
    pub fn info(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "ℹ".blue(), msg)
        } else {
            format!("ℹ {}", msg)
        }
    }

    /// One-line summary of how a run ended
    pub fn outcome(&self, outcome: &ExitOutcome) -> String {
        match outcome {
            ExitOutcome::Exited(0) => self.info("process exited with code 0"),
            ExitOutcome::Exited(code) => self.warning(&format!("process exited with code {}", code)),
            ExitOutcome::TimedOut(after) => self.warning(&format!(
                "process killed after {} ms timeout",
                after.as_millis()
            )),
            ExitOutcome::Failed(err) => self.error(&err.to_string()),
        }
    }
}

// Diagnostics go to stderr; stdout belongs to the child.
pub fn print_error(msg: &str) {
    let style = OutputStyle::default();
    eprintln!("{}", style.error(msg));
}

pub fn print_info(msg: &str) {
    if VerbosityLevel::Verbose.should_output() {
        let style = OutputStyle::default();
        eprintln!("{}", style.info(msg));
    }
}

/// Forwards child output to this process's stdout and stderr as it arrives
#[derive(Debug, Default)]
pub struct ConsoleCallback;

impl ConsoleCallback {
    fn forward(mut out: impl Write, chunk: &[u8]) {
        // A closed console (e.g. `| head`) must not abort the run.
        if out.write_all(chunk).and_then(|_| out.flush()).is_err() {
            tracing::debug!("console closed, dropping {} bytes", chunk.len());
        }
    }
}

impl StatusCallback for ConsoleCallback {
    fn on_start(&self, pid: u32) {
        print_info(&format!("started pid {}", pid));
    }

    fn on_stdout(&self, chunk: &[u8]) {
        Self::forward(std::io::stdout().lock(), chunk);
    }

    fn on_stderr(&self, chunk: &[u8]) {
        Self::forward(std::io::stderr().lock(), chunk);
    }

    fn on_exit(&self, outcome: &ExitOutcome) {
        if VerbosityLevel::Verbose.should_output() {
            eprintln!("{}", OutputStyle::default().outcome(outcome));
        }
    }
}
