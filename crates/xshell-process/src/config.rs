//! Process specification and its builder

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ProcessError, Result};

/// Default scratch buffer size for stream pumps
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Default time the runner waits for pumps to drain after a normal exit
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Immutable description of one process run
///
/// Built with [`ProcessSpecBuilder`]. Nothing is validated at build time;
/// an empty command is rejected when the runner tries to spawn it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    command: Vec<String>,
    working_dir: Option<PathBuf>,
    env: HashMap<String, String>,
    redirect_error_stream: bool,
    timeout: Duration,
}

impl ProcessSpec {
    /// Start a new builder
    pub fn builder() -> ProcessSpecBuilder {
        ProcessSpecBuilder::new()
    }

    /// Full argument vector, program first
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Program name (first element of the command), if any
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Arguments after the program name
    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or(&[])
    }

    /// Working directory override (None = inherit)
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Environment overlay applied on top of the inherited environment
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Whether stderr is merged into stdout at the OS level
    pub fn redirect_error_stream(&self) -> bool {
        self.redirect_error_stream
    }

    /// Wait bound; zero means wait indefinitely
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait bound as an option (None = no timeout)
    pub fn timeout_bound(&self) -> Option<Duration> {
        if self.timeout.is_zero() {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Check the spec can be spawned and return the program name
    pub(crate) fn validate(&self) -> Result<&str> {
        match self.program() {
            None => Err(ProcessError::Configuration(
                "command must not be empty".to_string(),
            )),
            Some("") => Err(ProcessError::Configuration(
                "program name must not be empty".to_string(),
            )),
            Some(program) => Ok(program),
        }
    }
}

/// Fluent builder for [`ProcessSpec`]
#[derive(Debug, Clone, Default)]
pub struct ProcessSpecBuilder {
    draft: ProcessSpec,
}

impl ProcessSpecBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the full command vector (program first), replacing any previous one
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.draft.command.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft.command.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.draft.working_dir = Some(dir.into());
        self
    }

    /// Add one environment override; later values for the same key win
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.draft.env.insert(key.into(), value.into());
        self
    }

    /// Merge several environment overrides into the overlay
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.draft
            .env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Merge stderr into stdout
    pub fn redirect_error_stream(mut self, redirect: bool) -> Self {
        self.draft.redirect_error_stream = redirect;
        self
    }

    /// Set the wait bound (zero = infinite)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.draft.timeout = timeout;
        self
    }

    /// Set the wait bound in milliseconds (zero = infinite)
    pub fn timeout_millis(mut self, millis: u64) -> Self {
        self.draft.timeout = Duration::from_millis(millis);
        self
    }

    /// Finalize the spec
    pub fn build(self) -> ProcessSpec {
        self.draft
    }
}

/// Runner-wide tuning knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    /// How long a normal exit waits for pumps to finish draining
    pub drain_grace: Duration,
    /// Scratch buffer size for each pump
    pub buffer_size: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            drain_grace: DEFAULT_DRAIN_GRACE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl RunnerOptions {
    /// Set drain grace
    pub fn drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Set pump buffer size (clamped to at least one byte)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_all_fields() {
        let spec = ProcessSpec::builder()
            .command(["ping", "-c", "1"])
            .arg("127.0.0.1")
            .working_dir("/tmp")
            .env("A", "1")
            .redirect_error_stream(true)
            .timeout_millis(250)
            .build();

        assert_eq!(spec.program(), Some("ping"));
        assert_eq!(spec.args(), ["-c", "1", "127.0.0.1"]);
        assert_eq!(spec.working_dir(), Some(Path::new("/tmp")));
        assert_eq!(spec.env().get("A").map(String::as_str), Some("1"));
        assert!(spec.redirect_error_stream());
        assert_eq!(spec.timeout_bound(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn later_env_values_win() {
        let spec = ProcessSpec::builder()
            .env("KEY", "first")
            .envs([("KEY", "second"), ("OTHER", "x")])
            .build();

        assert_eq!(spec.env().len(), 2);
        assert_eq!(spec.env()["KEY"], "second");
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let spec = ProcessSpec::builder().command(["true"]).build();
        assert!(spec.timeout().is_zero());
        assert_eq!(spec.timeout_bound(), None);
    }

    #[test]
    fn build_does_not_validate() {
        let spec = ProcessSpec::builder().build();
        assert!(spec.command().is_empty());
        assert!(spec.args().is_empty());
        assert!(matches!(
            spec.validate(),
            Err(ProcessError::Configuration(_))
        ));
    }

    #[test]
    fn empty_program_name_is_rejected() {
        let spec = ProcessSpec::builder().command(["", "arg"]).build();
        assert!(matches!(
            spec.validate(),
            Err(ProcessError::Configuration(_))
        ));
    }

    #[test]
    fn runner_options_clamp_buffer() {
        let options = RunnerOptions::default().buffer_size(0);
        assert_eq!(options.buffer_size, 1);
        assert_eq!(options.drain_grace, DEFAULT_DRAIN_GRACE);
    }
}
