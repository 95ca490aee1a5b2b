// xshell command-line front end

pub mod cli;
pub mod error;
pub mod logging;
pub mod output;
pub mod run;
pub mod settings;

pub use cli::Cli;
pub use error::{CliError, CliResult};
pub use logging::{init_logging, VerbosityLevel};
pub use run::{exit_status_for, run};
pub use settings::Settings;
