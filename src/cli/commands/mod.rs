//! Command execution: wires adapters into the pipeline and maps results to
//! exit codes (0 success, 2 partial failure, 1 fatal).

mod build;
mod create;
mod finish;
mod helpers;
mod release;
mod status;
mod validate;

use crate::EnvConfig;
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;

use build::execute_build;
use create::execute_create;
use finish::execute_finish;
use release::execute_release;
use status::execute_status;
use validate::execute_validate;

/// Execute the main command based on parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        // Never quiet for validation errors
        let output = super::OutputManager::new(false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);
    let env_config = EnvConfig::from_env();

    let result = match &args.command {
        Command::Release { .. } => execute_release(&args, &config, &env_config).await,
        Command::Create { .. } => execute_create(&args, &config, &env_config).await,
        Command::Build { .. } => execute_build(&args, &config, &env_config).await,
        Command::Status { .. } => execute_status(&args, &config).await,
        Command::Finish { .. } => execute_finish(&args, &config).await,
        Command::Validate => execute_validate(&args, &config).await,
    };

    match result {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            config.error_println(&format!(
                "Command '{}' failed: {}",
                args.command.name(),
                e
            ));
            helpers::print_suggestions(&config, &e);
            Ok(1)
        }
    }
}
