//! Finish command: closes a split run.
//!
//! Discards the run's release handle so a later build for the same run id
//! cannot pick it up, marks the run done and lists platforms whose asset is
//! not attached.

use super::helpers;
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;
use crate::handoff::FileHandoff;
use crate::release::RunId;
use crate::state::{RunPhase, StateManager, TaskStatus};

/// Execute finish command
pub(super) async fn execute_finish(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let Command::Finish { run_id, purge_state } = &args.command else {
        unreachable!("execute_finish called with non-Finish command");
    };

    let run = RunId::new(run_id.as_str())?;
    let registry = helpers::load_registry(args)?;
    let manager = StateManager::new(&args.state_dir);

    FileHandoff::new(args.handoff_dir()).discard(&run).await?;
    log::info!("Discarded release handle of run {}", run);

    if !manager.state_exists(&run) {
        config.warning_println(&format!("No state recorded for run {}", run));
        return Ok(1);
    }

    let state = manager
        .update(&run, |state| {
            if state.release.is_some() && !state.phase.is_terminal() {
                state.set_phase(RunPhase::Done);
                state.add_checkpoint("run_finished", RunPhase::Done, None);
            }
        })
        .await?;

    let missing: Vec<&str> = registry
        .targets()
        .iter()
        .filter(|target| {
            !matches!(
                state.tasks.get(&target.platform).map(|t| &t.status),
                Some(TaskStatus::Succeeded { .. })
            )
        })
        .map(|target| target.asset_name.as_str())
        .collect();

    config.println(&format!("📊 {}", state.summary()));

    if *purge_state {
        manager.cleanup_state(&run).await?;
        log::info!("Removed state of run {}", run);
    }

    let Some(release) = &state.release else {
        config.error_println(&format!("Run {} never created a release", run));
        return Ok(1);
    };

    if missing.is_empty() {
        config.success_println(&format!(
            "Release {} ({}) has all {} asset(s)",
            release.title,
            release.id,
            registry.len()
        ));
        Ok(0)
    } else {
        config.warning_println(&format!(
            "Release {} ({}) is missing {} of {} asset(s)",
            release.title,
            release.id,
            missing.len(),
            registry.len()
        ));
        for asset in &missing {
            config.indent(&format!("✗ {}", asset));
        }
        Ok(2)
    }
}
