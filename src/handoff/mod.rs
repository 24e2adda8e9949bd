//! Release handle handoff between the creation stage and the build tasks.
//!
//! The handle is a write-once, read-many value per pipeline run. `fetch`
//! suspends until `publish` has completed for the same run, or fails with
//! [`HandoffError::NoHandle`] once the wait budget is spent.

mod file;
mod memory;

pub use file::FileHandoff;
pub use memory::MemoryHandoff;

use crate::error::HandoffError;
use crate::release::{ReleaseHandle, RunId};
use async_trait::async_trait;
use std::time::Duration;

/// Default time a build task waits for the handle
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_secs(30);

/// Single-value broadcast of the release handle, keyed by run
#[async_trait]
pub trait HandoffStore: Send + Sync {
    /// Publish the run's handle. Fails if one was already published.
    async fn publish(&self, run: &RunId, handle: &ReleaseHandle) -> Result<(), HandoffError>;

    /// Wait for the run's handle
    async fn fetch(&self, run: &RunId) -> Result<ReleaseHandle, HandoffError>;
}
