// Logging and verbosity control

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::Level;

/// Global verbosity level
static VERBOSITY: AtomicU8 = AtomicU8::new(1);

/// Verbosity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerbosityLevel {
    /// Quiet mode - errors only
    Quiet = 0,
    /// Normal mode - configured log level
    Normal = 1,
    /// Verbose mode - debug logs
    Verbose = 2,
    /// Very verbose mode - trace logs
    VeryVerbose = 3,
}

impl VerbosityLevel {
    /// Get the current verbosity level
    pub fn current() -> Self {
        match VERBOSITY.load(Ordering::Relaxed) {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Normal,
            2 => VerbosityLevel::Verbose,
            _ => VerbosityLevel::VeryVerbose,
        }
    }

    /// Set the verbosity level
    pub fn set(level: Self) {
        VERBOSITY.store(level as u8, Ordering::Relaxed);
    }

    /// Check if we should output at this level
    pub fn should_output(&self) -> bool {
        self <= &Self::current()
    }

    /// Derive the verbosity from CLI flags
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            VerbosityLevel::Quiet
        } else {
            match verbose {
                0 => VerbosityLevel::Normal,
                1 => VerbosityLevel::Verbose,
                _ => VerbosityLevel::VeryVerbose,
            }
        }
    }

    /// Tracing level for this verbosity; `Normal` defers to the configured level
    pub fn tracing_level(&self, configured: Level) -> Level {
        match self {
            VerbosityLevel::Quiet => Level::ERROR,
            VerbosityLevel::Normal => configured,
            VerbosityLevel::Verbose => Level::DEBUG,
            VerbosityLevel::VeryVerbose => Level::TRACE,
        }
    }
}

/// Parse a log level name
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging based on CLI flags and the configured level
///
/// Logs go to stderr so they never mix with the child's stdout.
pub fn init_logging(verbose: u8, quiet: bool, configured: Level) -> VerbosityLevel {
    let verbosity = VerbosityLevel::from_flags(verbose, quiet);
    VerbosityLevel::set(verbosity);

    let debug = verbosity >= VerbosityLevel::Verbose;
    // A subscriber may already be installed (tests); keep the existing one.
    let _ = tracing_subscriber::fmt()
        .with_max_level(verbosity.tracing_level(configured))
        .with_target(debug)
        .with_thread_ids(debug)
        .with_writer(std::io::stderr)
        .try_init();

    verbosity
}
