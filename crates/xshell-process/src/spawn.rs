//! OS process creation and stdio wiring

use std::process::Stdio;

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::config::ProcessSpec;
use crate::error::{ProcessError, Result};

/// Any readable child stream
pub(crate) type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// A freshly spawned child with its output streams taken out
pub(crate) struct SpawnedChild {
    pub child: Child,
    pub pid: u32,
    /// Stdout, or the merged stdout+stderr pipe
    pub stdout: Option<BoxedReader>,
    /// Stderr when it has its own pipe
    pub stderr: Option<BoxedReader>,
    /// Stderr has its own pipe but belongs to the stdout sink
    pub stderr_to_stdout: bool,
}

/// Spawn the process described by `spec`
///
/// stdin is always null. With `redirect_error_stream` on Unix both stdout and
/// stderr are pointed at one OS pipe; elsewhere stderr keeps its own pipe and
/// is routed to the stdout sink by the runner.
pub(crate) fn spawn_child(spec: &ProcessSpec) -> Result<SpawnedChild> {
    let program = spec.validate()?;

    debug!(
        program = %program,
        args = ?spec.args(),
        cwd = ?spec.working_dir(),
        env_overrides = spec.env().len(),
        merged = spec.redirect_error_stream(),
        "Spawning process"
    );

    let mut cmd = Command::new(program);
    cmd.args(spec.args())
        .envs(spec.env())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    if let Some(dir) = spec.working_dir() {
        cmd.current_dir(dir);
    }

    let merged = wire_output(&mut cmd, spec.redirect_error_stream())
        .map_err(|e| ProcessError::spawn(program, e))?;

    let mut child = cmd.spawn().map_err(|e| ProcessError::spawn(program, e))?;
    // The command still owns the parent's copies of any pipe write ends;
    // they must be closed or the merged reader never sees EOF.
    drop(cmd);

    let pid = child.id().unwrap_or(0);
    let stdout: Option<BoxedReader> = match merged {
        Some(reader) => Some(reader),
        None => child.stdout.take().map(|s| Box::new(s) as BoxedReader),
    };
    let stderr = child.stderr.take().map(|s| Box::new(s) as BoxedReader);
    let stderr_to_stdout = spec.redirect_error_stream() && stderr.is_some();

    Ok(SpawnedChild {
        child,
        pid,
        stdout,
        stderr,
        stderr_to_stdout,
    })
}

/// Configure stdout/stderr; returns the merged reader when merging at OS level
#[cfg(unix)]
fn wire_output(cmd: &mut Command, redirect: bool) -> std::io::Result<Option<BoxedReader>> {
    use std::os::fd::OwnedFd;
    use tokio::net::unix::pipe;

    if !redirect {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        return Ok(None);
    }

    let (reader, writer) = std::io::pipe()?;
    let err_writer = writer.try_clone()?;
    cmd.stdout(writer).stderr(err_writer);

    let receiver = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;
    Ok(Some(Box::new(receiver)))
}

#[cfg(not(unix))]
fn wire_output(cmd: &mut Command, _redirect: bool) -> std::io::Result<Option<BoxedReader>> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    Ok(None)
}
