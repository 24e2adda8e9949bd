//! One build task: fetch handle, build, attach artifact.

use crate::error::BuildError;
use crate::handoff::HandoffStore;
use crate::registry::BuildTarget;
use crate::release::{ASSET_CONTENT_TYPE, ReleasePlatform, RunId, UploadedAsset};
use crate::toolchain::Toolchain;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Capabilities shared by every task of a run
#[derive(Clone)]
pub struct TaskContext {
    /// Run the tasks belong to
    pub run: RunId,
    /// Directory artifact paths are relative to
    pub project_dir: PathBuf,
    /// Where the release handle is fetched from
    pub handoff: Arc<dyn HandoffStore>,
    /// Builds the artifacts
    pub toolchain: Arc<dyn Toolchain>,
    /// Receives the uploads
    pub platform: Arc<dyn ReleasePlatform>,
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("run", &self.run)
            .field("project_dir", &self.project_dir)
            .finish_non_exhaustive()
    }
}

/// Build task for a single registry entry
#[derive(Debug)]
pub struct BuildTask {
    target: BuildTarget,
    ctx: TaskContext,
}

impl BuildTask {
    /// Create the task for `target`
    pub fn new(target: BuildTarget, ctx: TaskContext) -> Self {
        Self { target, ctx }
    }

    /// Target this task builds
    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    /// Run the task to completion or until `cancel` fires
    ///
    /// Cancellation drops the in-flight step, which also terminates a running
    /// toolchain process.
    pub async fn run(self, cancel: CancellationToken) -> Result<UploadedAsset, BuildError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::warn!("[{}] cancelled", self.target.platform);
                Err(BuildError::Cancelled {
                    platform: self.target.platform.clone(),
                })
            }
            result = self.execute() => result,
        }
    }

    async fn execute(&self) -> Result<UploadedAsset, BuildError> {
        let platform = &self.target.platform;

        log::debug!("[{}] waiting for release handle of run {}", platform, self.ctx.run);
        let handle = self
            .ctx
            .handoff
            .fetch(&self.ctx.run)
            .await
            .map_err(|source| BuildError::Handoff {
                platform: platform.clone(),
                source,
            })?;
        log::info!("[{}] building for release {}", platform, handle.release_id);

        self.ctx.toolchain.build(&self.target).await?;

        let content = self.read_artifact().await?;
        log::info!(
            "[{}] uploading {} ({} bytes)",
            platform,
            self.target.asset_name,
            content.len()
        );

        let asset = self
            .ctx
            .platform
            .upload_asset(&handle, &self.target.asset_name, ASSET_CONTENT_TYPE, content)
            .await
            .map_err(|source| BuildError::UploadFailed {
                asset_name: self.target.asset_name.clone(),
                source,
            })?;

        log::info!("[{}] attached {}", platform, asset.name);
        Ok(asset)
    }

    /// Resolve the artifact location against the project directory
    pub fn artifact_path(&self) -> PathBuf {
        resolve(&self.ctx.project_dir, &self.target.local_path)
    }

    async fn read_artifact(&self) -> Result<Bytes, BuildError> {
        let path = self.artifact_path();
        let missing = || BuildError::ArtifactMissing {
            platform: self.target.platform.clone(),
            path: path.clone(),
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(missing()),
        }

        tokio::fs::read(&path).await.map(Bytes::from).map_err(|e| {
            log::warn!("[{}] cannot read {}: {}", self.target.platform, path.display(), e);
            missing()
        })
    }
}

fn resolve(project_dir: &Path, local_path: &Path) -> PathBuf {
    if local_path.is_absolute() {
        local_path.to_path_buf()
    } else {
        project_dir.join(local_path)
    }
}
