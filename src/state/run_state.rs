//! Pipeline run state tracking and serialization.

use crate::error::{Result, StateError};
use crate::release::{ReleaseRecord, RunId, VersionTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current version of the state format
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Orchestrator phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RunPhase {
    /// Waiting for the trigger
    Start,
    /// Creating the release record
    ReleaseCreation,
    /// Build tasks running
    BuildFanOut,
    /// Every task reported an outcome
    Done,
    /// Release creation failed, no task ran
    Failed,
}

impl RunPhase {
    /// Whether the run can no longer make progress
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Start => write!(f, "Start"),
            RunPhase::ReleaseCreation => write!(f, "Release Creation"),
            RunPhase::BuildFanOut => write!(f, "Build Fan-Out"),
            RunPhase::Done => write!(f, "Done"),
            RunPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Checkpoint in the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCheckpoint {
    /// Checkpoint name
    pub name: String,
    /// Phase this checkpoint belongs to
    pub phase: RunPhase,
    /// Timestamp when checkpoint was reached
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Any data associated with this checkpoint
    pub data: Option<serde_json::Value>,
}

/// Outcome of one build task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Asset attached to the release
    Succeeded {
        /// Uploaded size in bytes
        size: u64,
        /// Download URL, if reported
        download_url: Option<String>,
    },
    /// Build, upload or handoff failed
    Failed {
        /// Error message
        reason: String,
    },
}

/// Build task entry of the run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Asset name the task publishes
    pub asset_name: String,
    /// Outcome
    pub status: TaskStatus,
    /// When the outcome was recorded
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

/// Complete pipeline run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Version of the state format
    pub format_version: u32,
    /// Save operation version (incremented on every save)
    pub save_version: u64,
    /// Run identity
    pub run_id: RunId,
    /// Triggering tag
    pub tag: VersionTag,
    /// Timestamp when the run started
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Timestamp when the run was last updated
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Current phase
    pub phase: RunPhase,
    /// Checkpoints passed during the run
    pub checkpoints: Vec<RunCheckpoint>,
    /// Release created by this run
    pub release: Option<ReleaseRecord>,
    /// Outcomes keyed by platform
    pub tasks: BTreeMap<String, TaskRecord>,
    /// Fatal error, if the run failed
    pub error: Option<String>,
}

impl RunState {
    /// Create a new run state
    pub fn new(run_id: RunId, tag: VersionTag) -> Self {
        let now = chrono::Utc::now();
        Self {
            format_version: STATE_FORMAT_VERSION,
            save_version: 0,
            run_id,
            tag,
            started_at: now,
            updated_at: now,
            phase: RunPhase::Start,
            checkpoints: Vec::new(),
            release: None,
            tasks: BTreeMap::new(),
            error: None,
        }
    }

    /// Add a checkpoint
    pub fn add_checkpoint(
        &mut self,
        name: impl Into<String>,
        phase: RunPhase,
        data: Option<serde_json::Value>,
    ) {
        self.checkpoints.push(RunCheckpoint {
            name: name.into(),
            phase,
            timestamp: chrono::Utc::now(),
            data,
        });
        self.updated_at = chrono::Utc::now();
    }

    /// Set current phase
    pub fn set_phase(&mut self, phase: RunPhase) {
        self.phase = phase;
        self.updated_at = chrono::Utc::now();
    }

    /// Remember the created release
    pub fn record_release(&mut self, release: &ReleaseRecord) {
        self.release = Some(release.clone());
        self.add_checkpoint(
            "release_created",
            RunPhase::ReleaseCreation,
            Some(serde_json::json!({
                "release_id": release.id.0,
                "html_url": release.html_url,
            })),
        );
    }

    /// Record a fatal error and fail the run
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.set_phase(RunPhase::Failed);
    }

    /// Record one task outcome
    pub fn record_task(&mut self, platform: &str, asset_name: &str, status: TaskStatus) {
        self.tasks.insert(
            platform.to_string(),
            TaskRecord {
                asset_name: asset_name.to_string(),
                status,
                finished_at: chrono::Utc::now(),
            },
        );
        self.updated_at = chrono::Utc::now();
    }

    /// Platforms whose task failed
    pub fn failed_platforms(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|(_, t)| matches!(t.status, TaskStatus::Failed { .. }))
            .map(|(p, _)| p.as_str())
            .collect()
    }

    /// Get elapsed time
    pub fn elapsed_time(&self) -> chrono::Duration {
        self.updated_at - self.started_at
    }

    /// Validate state consistency
    pub fn validate(&self) -> Result<()> {
        if self.format_version != STATE_FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_FORMAT_VERSION.to_string(),
                found: self.format_version.to_string(),
            }
            .into());
        }
        if self.phase >= RunPhase::BuildFanOut && self.phase != RunPhase::Failed && self.release.is_none() {
            return Err(StateError::Corrupted {
                reason: format!("run reached {} without a release", self.phase),
            }
            .into());
        }
        Ok(())
    }

    /// Create a summary of the run
    pub fn summary(&self) -> String {
        let failed = self.failed_platforms();
        let succeeded = self.tasks.len() - failed.len();
        format!(
            "Run {} for {} ({}) - {}/{} asset(s) attached - {} elapsed",
            self.run_id,
            self.tag,
            self.phase,
            succeeded,
            self.tasks.len(),
            format_duration(self.elapsed_time())
        )
    }
}

fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
