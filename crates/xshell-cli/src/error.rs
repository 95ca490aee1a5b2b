// CLI error types

use thiserror::Error;
use xshell_process::ProcessError;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!("Invalid argument: {}\n\nRun 'xshell --help' for usage information.", message)
            }
            CliError::Config(msg) => {
                format!(
                    "Configuration error: {}\n\nRun 'xshell --print-config' to check the effective settings.",
                    msg
                )
            }
            CliError::Io(e) => format!("I/O error: {}", e),
            CliError::Process(e) => format!("Process error: {}", e),
        }
    }

    /// Exit status used when the error ends the program
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument { .. } | CliError::Config(_) => 2,
            CliError::Io(_) | CliError::Process(_) => 1,
        }
    }
}

impl From<config::ConfigError> for CliError {
    fn from(err: config::ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;
