//! Release command: the whole pipeline in one process.

use super::helpers;
use crate::EnvConfig;
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;
use crate::handoff::MemoryHandoff;
use crate::pipeline::Orchestrator;
use crate::state::StateManager;
use std::sync::Arc;

/// Execute release command
pub(super) async fn execute_release(
    args: &Args,
    config: &RuntimeConfig,
    env_config: &EnvConfig,
) -> Result<i32> {
    let Command::Release { tag, run_id } = &args.command else {
        unreachable!("execute_release called with non-Release command");
    };

    let tag = helpers::resolve_tag(tag.as_deref(), env_config)?;
    let run = helpers::resolve_run_id(run_id.as_deref())?;
    let registry = helpers::load_registry(args)?;
    let platform = helpers::github_platform(args, env_config)?;

    config.println(&format!("🚀 Releasing {} (run {})", tag, run));
    if let Some(version) = tag.semver() {
        log::debug!("Tag parses as version {}", version);
    }
    for target in registry.targets() {
        config.indent(&format!("{} → {}", target.platform, target.asset_name));
    }

    let orchestrator = Orchestrator::new(
        run,
        registry,
        platform,
        Arc::new(MemoryHandoff::new(helpers::handoff_timeout(args))),
        Arc::new(helpers::cargo_toolchain(args)),
    )
    .with_project_dir(&args.project_dir)
    .with_policy(helpers::failure_policy(args))
    .with_cancellation(helpers::cancel_on_ctrl_c())
    .with_state(StateManager::new(&args.state_dir));

    let outcome = orchestrator.run(tag).await;
    helpers::report_outcome(config, &outcome);
    Ok(outcome.exit_code())
}
