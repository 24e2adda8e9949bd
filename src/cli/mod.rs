//! Command line interface for hyperlink_release.
//!
//! Parses arguments, wires the concrete adapters (GitHub, cargo, handoff
//! store) into the pipeline and maps outcomes to exit codes.

mod args;
pub mod commands;
mod output;
mod retry_config;

pub use args::{Args, Command, RuntimeConfig};
pub use commands::execute_command;
pub use output::OutputManager;
pub use retry_config::RetryConfig;

use crate::error::Result;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    execute_command(args).await
}
