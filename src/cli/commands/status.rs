//! Status command implementation.
//!
//! Displays the persisted state of a pipeline run.

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::{ReleaseError, Result};
use crate::release::RunId;
use crate::state::{StateManager, TaskStatus};

/// Execute status command
pub(super) async fn execute_status(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let Command::Status {
        run_id,
        detailed,
        json,
    } = &args.command
    else {
        unreachable!("execute_status called with non-Status command");
    };

    let run = RunId::new(run_id.as_str())?;
    let manager = StateManager::new(&args.state_dir);

    if !manager.state_exists(&run) {
        if *json {
            println!("{{\"status\": \"unknown_run\"}}");
        } else {
            config.println(&format!("No state recorded for run {}", run));
        }
        return Ok(1);
    }

    let state = manager.load_state(&run).await?;

    if *json {
        let json_output = serde_json::to_string_pretty(&state).map_err(ReleaseError::Json)?;
        println!("{}", json_output);
        return Ok(0);
    }

    config.println(&format!("📊 {}", state.summary()));

    if let Some(release) = &state.release {
        config.indent(&format!("Release: {} ({})", release.title, release.id));
        if let Some(url) = &release.html_url {
            config.indent(&format!("URL: {}", url));
        }
    }
    if let Some(error) = &state.error {
        config.error_println(error);
    }

    for (platform, task) in &state.tasks {
        match &task.status {
            TaskStatus::Succeeded { size, .. } => {
                config.indent(&format!("✓ {} → {} ({} bytes)", platform, task.asset_name, size))
            }
            TaskStatus::Failed { reason } => {
                config.indent(&format!("✗ {} → {}: {}", platform, task.asset_name, reason))
            }
        }
    }

    if *detailed {
        config.println(&format!("Started: {}", state.started_at));
        config.println(&format!("Updated: {}", state.updated_at));

        if !state.checkpoints.is_empty() {
            config.println("\nCheckpoints:");
            for checkpoint in &state.checkpoints {
                config.println(&format!(
                    "  ✓ {} ({}) at {}",
                    checkpoint.name, checkpoint.phase, checkpoint.timestamp
                ));
            }
        }
    }

    Ok(0)
}
