//! # xshell-process
//!
//! **Purpose**: Run one external process at a time and stream its output as it
//! is produced.
//!
//! ## Features
//!
//! - **Fluent spec builder**: argv-style command, working directory, environment
//!   overlay, stderr merging and a wait timeout
//! - **Incremental output**: stdout/stderr chunks delivered through callbacks or
//!   an event channel while the process runs
//! - **Timeouts**: bounded wait; on expiry the child is killed and the run is
//!   reported as timed out
//! - **Single-run guard**: a runner rejects `start` while a run is in flight
//! - **Text adapter**: chunk-boundary-safe UTF-8 decoding for string consumers
//!
//! The engine never parses shell syntax. Pipelines, globbing and quoting are
//! the caller's business.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use xshell_process::{ProcessEvent, ProcessRunner, ProcessSpec};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = ProcessRunner::new();
//!
//! let spec = ProcessSpec::builder()
//!     .command(["ping", "-c", "3", "127.0.0.1"])
//!     .env("LC_ALL", "C")
//!     .redirect_error_stream(true)
//!     .timeout(Duration::from_secs(10))
//!     .build();
//!
//! let (handle, mut events) = runner.start_with_events(spec)?;
//! while let Some(event) = events.recv().await {
//!     let done = event.is_terminal();
//!     match event {
//!         ProcessEvent::Stdout(chunk) => print!("{}", String::from_utf8_lossy(&chunk)),
//!         ProcessEvent::Exit(outcome) => println!("exit: {:?}", outcome),
//!         _ => {}
//!     }
//!     if done {
//!         break;
//!     }
//! }
//!
//! let outcome = handle.wait().await;
//! println!("exit code: {:?}", outcome.exit_code());
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod config;
pub mod error;
pub mod outcome;
pub mod pump;
pub mod runner;
mod spawn;
pub mod text;
pub mod waiter;

pub use callback::{ChannelCallback, EventReceiver, NoopCallback, ProcessEvent, StatusCallback};
pub use config::{ProcessSpec, ProcessSpecBuilder, RunnerOptions};
pub use error::{ProcessError, Result, StreamKind};
pub use outcome::ExitOutcome;
pub use pump::{PumpReport, StreamPump};
pub use runner::{ProcessRunner, RunHandle, RunState};
pub use text::{TextCallback, TextSink, Utf8Decoder};
pub use waiter::{ProcessWaiter, WaitResult};
