//! Release pipeline: create the release once, then fan out to build tasks.

mod orchestrator;
mod task;

pub use orchestrator::Orchestrator;
pub use task::{BuildTask, TaskContext};

use crate::error::{BuildError, ReleaseError};
use crate::release::{ReleaseRecord, UploadedAsset};
use crate::state::TaskStatus;

/// What happens to running tasks when one of them fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Siblings keep running
    #[default]
    Independent,
    /// The first failure cancels every task still in flight
    CancelSiblings,
}

/// Outcome of one build task
#[derive(Debug)]
pub struct TaskReport {
    /// Platform identifier
    pub platform: String,
    /// Asset name the task publishes
    pub asset_name: String,
    /// Uploaded asset or the reason the task failed
    pub result: Result<UploadedAsset, BuildError>,
}

impl TaskReport {
    /// Persistable form of the outcome
    pub fn status(&self) -> TaskStatus {
        match &self.result {
            Ok(asset) => TaskStatus::Succeeded {
                size: asset.size,
                download_url: asset.download_url.clone(),
            },
            Err(error) => TaskStatus::Failed {
                reason: error.to_string(),
            },
        }
    }
}

/// Failed build task
#[derive(Debug)]
pub struct TaskFailure {
    /// Platform identifier
    pub platform: String,
    /// Asset name the task would have published
    pub asset_name: String,
    /// Reason
    pub error: BuildError,
}

/// Aggregated result of a pipeline run
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every task attached its asset
    Success {
        /// Release created by the run
        release: ReleaseRecord,
        /// Attached assets in registry order
        assets: Vec<UploadedAsset>,
    },
    /// The release exists but at least one task failed
    PartialFailure {
        /// Release created by the run
        release: ReleaseRecord,
        /// Attached assets in registry order
        succeeded: Vec<UploadedAsset>,
        /// Failed tasks in registry order
        failed: Vec<TaskFailure>,
    },
    /// Release creation failed; no task ran
    Fatal {
        /// Cause
        error: ReleaseError,
    },
}

impl PipelineOutcome {
    /// Aggregate task reports for `release`
    pub fn from_reports(release: ReleaseRecord, reports: Vec<TaskReport>) -> Self {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for report in reports {
            match report.result {
                Ok(asset) => succeeded.push(asset),
                Err(error) => failed.push(TaskFailure {
                    platform: report.platform,
                    asset_name: report.asset_name,
                    error,
                }),
            }
        }

        if failed.is_empty() {
            PipelineOutcome::Success {
                release,
                assets: succeeded,
            }
        } else {
            PipelineOutcome::PartialFailure {
                release,
                succeeded,
                failed,
            }
        }
    }

    /// Process exit code: 0 success, 2 partial failure, 1 fatal
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineOutcome::Success { .. } => 0,
            PipelineOutcome::PartialFailure { .. } => 2,
            PipelineOutcome::Fatal { .. } => 1,
        }
    }

    /// Whether every task succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success { .. })
    }

    /// Release created by the run, if any
    pub fn release(&self) -> Option<&ReleaseRecord> {
        match self {
            PipelineOutcome::Success { release, .. }
            | PipelineOutcome::PartialFailure { release, .. } => Some(release),
            PipelineOutcome::Fatal { .. } => None,
        }
    }

    /// Assets attached to the release
    pub fn assets(&self) -> &[UploadedAsset] {
        match self {
            PipelineOutcome::Success { assets, .. } => assets,
            PipelineOutcome::PartialFailure { succeeded, .. } => succeeded,
            PipelineOutcome::Fatal { .. } => &[],
        }
    }

    /// Platforms whose task failed
    pub fn failed_platforms(&self) -> Vec<&str> {
        match self {
            PipelineOutcome::PartialFailure { failed, .. } => {
                failed.iter().map(|f| f.platform.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::release::{ReleaseId, VersionTag};

    fn release() -> ReleaseRecord {
        ReleaseRecord {
            id: ReleaseId(7),
            tag: VersionTag::new("v1.2.0").expect("tag"),
            title: "v1.2.0".to_string(),
            draft: false,
            prerelease: false,
            html_url: None,
        }
    }

    fn ok(platform: &str, asset: &str) -> TaskReport {
        TaskReport {
            platform: platform.to_string(),
            asset_name: asset.to_string(),
            result: Ok(UploadedAsset {
                name: asset.to_string(),
                size: 1,
                download_url: None,
            }),
        }
    }

    #[test]
    fn test_all_succeeded_is_success() {
        let outcome = PipelineOutcome::from_reports(release(), vec![ok("linux", "a"), ok("macos", "b")]);
        assert!(outcome.is_success());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.assets().len(), 2);
    }

    #[test]
    fn test_one_failure_is_partial() {
        let failed = TaskReport {
            platform: "macos".to_string(),
            asset_name: "b".to_string(),
            result: Err(BuildError::ToolchainFailed {
                platform: "macos".to_string(),
                reason: "linker error".to_string(),
            }),
        };
        let outcome = PipelineOutcome::from_reports(release(), vec![ok("linux", "a"), failed]);
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(outcome.failed_platforms(), ["macos"]);
        assert_eq!(outcome.release().map(|r| r.id), Some(ReleaseId(7)));
    }

    #[test]
    fn test_fatal_has_no_release() {
        let outcome = PipelineOutcome::Fatal {
            error: PlatformError::AuthenticationFailed {
                reason: "bad token".to_string(),
            }
            .into(),
        };
        assert_eq!(outcome.exit_code(), 1);
        assert!(outcome.release().is_none());
        assert!(outcome.assets().is_empty());
    }
}
