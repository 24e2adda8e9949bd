//! Build command: one build task of a split pipeline.

use super::helpers;
use crate::EnvConfig;
use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::Result;
use crate::handoff::FileHandoff;
use crate::pipeline::{BuildTask, TaskContext, TaskReport};
use crate::release::RunId;
use crate::state::StateManager;
use std::sync::Arc;

/// Execute build command
pub(super) async fn execute_build(
    args: &Args,
    config: &RuntimeConfig,
    env_config: &EnvConfig,
) -> Result<i32> {
    let Command::Build { platform, run_id } = &args.command else {
        unreachable!("execute_build called with non-Build command");
    };

    let run = RunId::new(run_id.as_str())?;
    let registry = helpers::load_registry(args)?;
    let target = registry.get(platform)?.clone();

    let ctx = TaskContext {
        run: run.clone(),
        project_dir: args.project_dir.clone(),
        handoff: Arc::new(
            FileHandoff::new(args.handoff_dir()).with_wait(helpers::handoff_timeout(args)),
        ),
        toolchain: Arc::new(helpers::cargo_toolchain(args)),
        platform: helpers::github_platform(args, env_config)?,
    };

    config.println(&format!(
        "🔨 Building {} → {} (run {})",
        target.platform, target.asset_name, run
    ));

    let report = TaskReport {
        platform: target.platform.clone(),
        asset_name: target.asset_name.clone(),
        result: BuildTask::new(target, ctx)
            .run(helpers::cancel_on_ctrl_c())
            .await,
    };

    record_outcome(&StateManager::new(&args.state_dir), &run, &report).await;

    match &report.result {
        Ok(asset) => {
            config.success_println(&format!("Attached {} ({} bytes)", asset.name, asset.size));
            Ok(0)
        }
        Err(e) => {
            config.error_println(&format!("{}: {}", report.platform, e));
            Ok(1)
        }
    }
}

/// Add the outcome to the run state written by the create job, if present
async fn record_outcome(manager: &StateManager, run: &RunId, report: &TaskReport) {
    if !manager.state_exists(run) {
        log::debug!("No state for run {}, outcome not recorded", run);
        return;
    }

    let result = manager
        .update(run, |state| {
            state.record_task(&report.platform, &report.asset_name, report.status())
        })
        .await;

    if let Err(e) = result {
        log::warn!("Failed to record outcome for run {}: {}", run, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::release::{ReleaseId, ReleaseRecord, UploadedAsset, VersionTag};
    use crate::state::{RunPhase, RunState};
    use tempfile::TempDir;

    fn report(platform: &str, ok: bool) -> TaskReport {
        let asset_name = format!("hyperlink-{platform}");
        TaskReport {
            platform: platform.to_string(),
            asset_name: asset_name.clone(),
            result: if ok {
                Ok(UploadedAsset {
                    name: asset_name,
                    size: 5,
                    download_url: None,
                })
            } else {
                Err(BuildError::ToolchainFailed {
                    platform: platform.to_string(),
                    reason: "linker error".to_string(),
                })
            },
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn test_parallel_build_jobs_all_recorded() {
        let dir = TempDir::new().expect("temp dir");
        let manager = StateManager::new(dir.path());
        let run = RunId::new("ci-split").expect("run id");
        let tag = VersionTag::new("v1.2.0").expect("tag");
        let mut state = RunState::new(run.clone(), tag.clone());
        state.record_release(&ReleaseRecord {
            id: ReleaseId(3),
            tag,
            title: "v1.2.0".to_string(),
            draft: false,
            prerelease: false,
            html_url: None,
        });
        state.set_phase(RunPhase::BuildFanOut);
        manager.save_state(&mut state).await.expect("create job save");

        let jobs = [report("linux", true), report("macos", false), report("windows", true)];
        let mut handles = Vec::new();
        for job in jobs {
            let manager = manager.clone();
            let run = run.clone();
            handles.push(tokio::spawn(async move {
                record_outcome(&manager, &run, &job).await
            }));
        }
        for handle in handles {
            handle.await.expect("job");
        }

        let state = manager.load_state(&run).await.expect("load");
        assert_eq!(state.tasks.len(), 3);
        assert_eq!(state.failed_platforms(), ["macos"]);
    }

    #[tokio::test]
    async fn test_outcome_without_state_is_skipped() {
        let dir = TempDir::new().expect("temp dir");
        let manager = StateManager::new(dir.path());
        let run = RunId::new("no-create").expect("run id");
        record_outcome(&manager, &run, &report("linux", true)).await;
        assert!(!manager.state_exists(&run));
    }
}
