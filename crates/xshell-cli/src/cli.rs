// Command-line definition

use std::path::PathBuf;

use clap::Parser;

/// xshell - run an external command and stream its output
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "xshell")]
#[command(bin_name = "xshell")]
#[command(about = "Run an external command and stream its output as it is produced")]
#[command(
    long_about = "Run an external command and stream its output as it is produced.\n\nThe command is executed directly, never through a shell. Use `--` to pass\nan argument vector, or --line for a whitespace-split command line.\n\nExit status is the child's exit code, 124 on timeout, 127 when the\nprogram cannot be started and 2 on usage or configuration errors."
)]
#[command(version)]
pub struct Cli {
    /// Command line split on whitespace (no quoting)
    #[arg(short, long, value_name = "LINE", conflicts_with = "command")]
    pub line: Option<String>,

    /// Working directory for the child
    #[arg(short = 'C', long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Extra environment variable (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Kill the child after this many milliseconds (0 = wait forever)
    #[arg(short, long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Merge the child's stderr into its stdout
    #[arg(short, long)]
    pub merge_stderr: bool,

    /// Settings file (default: <config dir>/xshell/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the effective settings and exit
    #[arg(long)]
    pub print_config: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Errors only
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Program and arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Parse a `KEY=VALUE` pair; the value may itself contain `=`
pub fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("missing variable name in '{}'", raw)),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Naive command-line tokenizer: splits on whitespace, no quoting or escapes
pub fn tokenize_line(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}
