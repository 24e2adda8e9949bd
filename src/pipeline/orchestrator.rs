//! Pipeline state machine.
//!
//! `Start -> ReleaseCreation -> BuildFanOut -> Done`, or
//! `ReleaseCreation -> Failed` when the release cannot be created. An
//! orchestrator is consumed by a run and cannot be re-entered.

use super::task::{BuildTask, TaskContext};
use super::{FailurePolicy, PipelineOutcome, TaskReport};
use crate::error::{BuildError, CliError, Result, StateError};
use crate::handoff::HandoffStore;
use crate::registry::BuildRegistry;
use crate::release::{ReleaseCreator, ReleaseHandle, ReleasePlatform, ReleaseRecord, RunId, VersionTag};
use crate::state::{RunPhase, RunState, StateManager};
use crate::toolchain::Toolchain;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Drives one pipeline run
pub struct Orchestrator {
    registry: BuildRegistry,
    creator: ReleaseCreator,
    ctx: TaskContext,
    policy: FailurePolicy,
    cancel: CancellationToken,
    state: Option<StateManager>,
}

impl Orchestrator {
    /// Create an orchestrator for `run` over `registry`
    pub fn new(
        run: RunId,
        registry: BuildRegistry,
        platform: Arc<dyn ReleasePlatform>,
        handoff: Arc<dyn HandoffStore>,
        toolchain: Arc<dyn Toolchain>,
    ) -> Self {
        Self {
            registry,
            creator: ReleaseCreator::new(Arc::clone(&platform)),
            ctx: TaskContext {
                run,
                project_dir: PathBuf::from("."),
                handoff,
                toolchain,
                platform,
            },
            policy: FailurePolicy::default(),
            cancel: CancellationToken::new(),
            state: None,
        }
    }

    /// Resolve artifact paths against `dir`
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ctx.project_dir = dir.into();
        self
    }

    /// Set the task failure policy
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Abort the run when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Persist run state through `manager`
    pub fn with_state(mut self, manager: StateManager) -> Self {
        self.state = Some(manager);
        self
    }

    /// Execute the whole pipeline for `tag`
    pub async fn run(self, tag: VersionTag) -> PipelineOutcome {
        let mut state = match self.begin(&tag).await {
            Ok(state) => state,
            Err(error) => return PipelineOutcome::Fatal { error },
        };

        let release = match self.create_and_publish(&tag, &mut state).await {
            Ok((release, _handle)) => release,
            Err(error) => return PipelineOutcome::Fatal { error },
        };

        let reports = self.fan_out(&mut state).await;

        state.set_phase(RunPhase::Done);
        let failed = reports.iter().filter(|r| r.result.is_err()).count();
        state.add_checkpoint(
            "fan_out_complete",
            RunPhase::Done,
            Some(serde_json::json!({
                "succeeded": reports.len() - failed,
                "failed": failed,
            })),
        );
        self.persist(&mut state).await;

        let outcome = PipelineOutcome::from_reports(release, reports);
        match &outcome {
            PipelineOutcome::Success { assets, .. } => {
                log::info!("Run {} complete: {} asset(s) attached", self.ctx.run, assets.len());
            }
            PipelineOutcome::PartialFailure { .. } => {
                log::warn!(
                    "Run {} finished with failed platforms: {}",
                    self.ctx.run,
                    outcome.failed_platforms().join(", ")
                );
            }
            PipelineOutcome::Fatal { .. } => {}
        }
        outcome
    }

    /// Execute only the release-creation stage
    ///
    /// Build tasks of the run are expected to start elsewhere and pick the
    /// handle up from the handoff store.
    pub async fn create_only(self, tag: VersionTag) -> Result<(ReleaseRecord, ReleaseHandle)> {
        let mut state = self.begin(&tag).await?;
        self.create_and_publish(&tag, &mut state).await
    }

    /// Refuse a run that already created its release
    async fn begin(&self, tag: &VersionTag) -> Result<RunState> {
        let run = &self.ctx.run;
        if let Some(manager) = &self.state
            && manager.state_exists(run)
        {
            let existing = manager.load_state(run).await?;
            if let Some(release) = existing.release {
                return Err(StateError::AlreadyReleased {
                    run_id: run.to_string(),
                    release_id: release.id.0,
                }
                .into());
            }
            log::info!("Run {} has state without a release, starting over", run);
        }

        if self.cancel.is_cancelled() {
            return Err(CliError::ExecutionFailed {
                command: "release".to_string(),
                reason: "aborted before release creation".to_string(),
            }
            .into());
        }

        Ok(RunState::new(run.clone(), tag.clone()))
    }

    async fn create_and_publish(
        &self,
        tag: &VersionTag,
        state: &mut RunState,
    ) -> Result<(ReleaseRecord, ReleaseHandle)> {
        state.set_phase(RunPhase::ReleaseCreation);
        self.persist(state).await;

        let (release, handle) = match self.creator.create_release(tag).await {
            Ok(created) => created,
            Err(e) => {
                log::error!("Release creation for {} failed: {}", tag, e);
                self.fail(state, &e.to_string()).await;
                return Err(e);
            }
        };
        state.record_release(&release);
        self.persist(state).await;

        // Tasks only ever learn the handle through the store
        if let Err(e) = self.ctx.handoff.publish(&self.ctx.run, &handle).await {
            log::error!(
                "Release {} created but its handle could not be published: {}",
                release.id,
                e
            );
            self.fail(state, &e.to_string()).await;
            return Err(e.into());
        }

        state.set_phase(RunPhase::BuildFanOut);
        state.add_checkpoint("handle_published", RunPhase::BuildFanOut, None);
        self.persist(state).await;

        Ok((release, handle))
    }

    async fn fan_out(&self, state: &mut RunState) -> Vec<TaskReport> {
        let tasks_cancel = self.cancel.child_token();
        let mut join_set = JoinSet::new();

        log::info!(
            "Starting {} build task(s) for run {}",
            self.registry.len(),
            self.ctx.run
        );

        for target in self.registry.targets() {
            let task = BuildTask::new(target.clone(), self.ctx.clone());
            let cancel = tasks_cancel.clone();
            let policy = self.policy;

            join_set.spawn(async move {
                let platform = task.target().platform.clone();
                let asset_name = task.target().asset_name.clone();
                let result = task.run(cancel.clone()).await;

                if let Err(e) = &result
                    && policy == FailurePolicy::CancelSiblings
                    && !matches!(e, BuildError::Cancelled { .. })
                {
                    log::warn!("[{}] failed, cancelling sibling tasks", platform);
                    cancel.cancel();
                }

                TaskReport {
                    platform,
                    asset_name,
                    result,
                }
            });
        }

        let mut finished: HashMap<String, TaskReport> = HashMap::new();
        let mut join_errors = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(report) => {
                    match &report.result {
                        Ok(asset) => log::info!("[{}] done: {}", report.platform, asset.name),
                        Err(e) => log::error!("[{}] failed: {}", report.platform, e),
                    }
                    state.record_task(&report.platform, &report.asset_name, report.status());
                    self.persist(state).await;
                    finished.insert(report.platform.clone(), report);
                }
                Err(e) => {
                    log::error!("Build task aborted: {}", e);
                    join_errors.push(e.to_string());
                }
            }
        }

        // Registry order; a task that never reported was lost to a panic or abort
        let mut reports = Vec::with_capacity(self.registry.len());
        for target in self.registry.targets() {
            let report = finished.remove(&target.platform).unwrap_or_else(|| {
                let reason = if join_errors.is_empty() {
                    "task did not report an outcome".to_string()
                } else {
                    join_errors.join("; ")
                };
                let report = TaskReport {
                    platform: target.platform.clone(),
                    asset_name: target.asset_name.clone(),
                    result: Err(BuildError::Aborted {
                        platform: target.platform.clone(),
                        reason,
                    }),
                };
                state.record_task(&report.platform, &report.asset_name, report.status());
                report
            });
            reports.push(report);
        }
        reports
    }

    async fn fail(&self, state: &mut RunState, error: &str) {
        state.record_failure(error);
        self.persist(state).await;
    }

    async fn persist(&self, state: &mut RunState) {
        let Some(manager) = &self.state else {
            return;
        };
        match manager.save_state(state).await {
            Ok(saved) => log::trace!(
                "State saved: {} bytes in {:.2}s",
                saved.file_size_bytes,
                saved.save_duration.as_secs_f64()
            ),
            Err(e) => log::warn!("Failed to persist state for run {}: {}", state.run_id, e),
        }
    }
}
