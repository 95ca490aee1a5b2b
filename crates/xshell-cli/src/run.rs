// Run one command from the CLI

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use xshell_process::{
    ExitOutcome, ProcessError, ProcessRunner, ProcessSpec, RunnerOptions, StatusCallback,
};

use crate::cli::{tokenize_line, Cli};
use crate::error::{CliError, CliResult};
use crate::logging::init_logging;
use crate::output::ConsoleCallback;
use crate::settings::Settings;

/// Exit status reported when the wait bound elapsed
pub const EXIT_TIMEOUT: i32 = 124;
/// Exit status reported when the program could not be started
pub const EXIT_SPAWN_FAILED: i32 = 127;
/// Exit status for usage and configuration errors
pub const EXIT_USAGE: i32 = 2;

/// Resolve the argument vector from `--line` or the trailing command
pub fn resolve_command(cli: &Cli) -> CliResult<Vec<String>> {
    let command = match &cli.line {
        Some(line) => tokenize_line(line),
        None => cli.command.clone(),
    };

    if command.is_empty() {
        return Err(CliError::InvalidArgument {
            message: "no command given".to_string(),
        });
    }
    Ok(command)
}

/// Combine settings and flags into a process spec; flags win
pub fn build_spec(cli: &Cli, settings: &Settings) -> CliResult<ProcessSpec> {
    let command = resolve_command(cli)?;
    let timeout_ms = cli.timeout_ms.unwrap_or(settings.timeout_ms);

    let mut builder = ProcessSpec::builder()
        .command(command)
        .envs(settings.env.iter())
        .envs(cli.env.iter().cloned())
        .redirect_error_stream(cli.merge_stderr || settings.redirect_error_stream)
        .timeout(Duration::from_millis(timeout_ms));

    if let Some(dir) = &cli.cwd {
        builder = builder.working_dir(dir);
    }

    Ok(builder.build())
}

/// Map an outcome to this program's exit status
pub fn exit_status_for(outcome: &ExitOutcome) -> i32 {
    match outcome {
        ExitOutcome::Exited(code) => *code,
        ExitOutcome::TimedOut(_) => EXIT_TIMEOUT,
        ExitOutcome::Failed(ProcessError::Spawn { .. }) => EXIT_SPAWN_FAILED,
        ExitOutcome::Failed(ProcessError::Configuration(_)) => EXIT_USAGE,
        ExitOutcome::Failed(_) => 1,
    }
}

/// Write the effective settings as TOML
pub fn write_settings(mut out: impl Write, settings: &Settings) -> CliResult<()> {
    out.write_all(settings.to_toml()?.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Execute the CLI request and return the exit status
pub async fn run(cli: Cli) -> CliResult<i32> {
    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(cli.verbose, cli.quiet, settings.level());

    if cli.print_config {
        write_settings(std::io::stdout().lock(), &settings)?;
        return Ok(0);
    }

    let spec = build_spec(&cli, &settings)?;
    debug!(command = ?spec.command(), timeout = ?spec.timeout_bound(), "Built process spec");

    let options = RunnerOptions::default().drain_grace(settings.drain_grace());
    let runner = ProcessRunner::with_options(options);
    let console: Arc<dyn StatusCallback> = Arc::new(ConsoleCallback);
    let handle = runner.start(spec, Some(console))?;

    let outcome = handle.wait().await;
    info!(?outcome, "Run finished");

    if let ExitOutcome::Failed(err) = &outcome {
        crate::output::print_error(&err.to_string());
    }

    Ok(exit_status_for(&outcome))
}
