//! Create command: release-creation stage of a split pipeline.

use super::helpers;
use crate::EnvConfig;
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;
use crate::handoff::FileHandoff;
use crate::pipeline::Orchestrator;
use crate::release::RunId;
use crate::state::StateManager;
use std::sync::Arc;

/// Execute create command
pub(super) async fn execute_create(
    args: &Args,
    config: &RuntimeConfig,
    env_config: &EnvConfig,
) -> Result<i32> {
    let Command::Create { tag, run_id } = &args.command else {
        unreachable!("execute_create called with non-Create command");
    };

    let tag = helpers::resolve_tag(tag.as_deref(), env_config)?;
    let run = RunId::new(run_id.as_str())?;
    let registry = helpers::load_registry(args)?;
    let platform = helpers::github_platform(args, env_config)?;
    let handoff = FileHandoff::new(args.handoff_dir());

    config.println(&format!("📦 Creating release {} (run {})", tag, run));

    let (release, handle) = Orchestrator::new(
        run.clone(),
        registry,
        platform,
        Arc::new(handoff.clone()),
        Arc::new(helpers::cargo_toolchain(args)),
    )
    .with_state(StateManager::new(&args.state_dir))
    .create_only(tag)
    .await?;

    config.success_println(&format!("Created release {} ({})", release.title, release.id));
    config.indent(&format!("Upload handle: {}", handle.upload_url));
    config.indent(&format!("Stored at {}", handoff.record_path(&run).display()));
    if let Some(url) = &release.html_url {
        config.println(&format!("🔗 {}", url));
    }
    Ok(0)
}
