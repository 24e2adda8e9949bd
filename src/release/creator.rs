//! Release creation stage.

use super::{ReleaseHandle, ReleasePlatform, ReleaseRecord, ReleaseRequest, VersionTag};
use crate::error::{PlatformError, Result};
use std::sync::Arc;

/// Creates the single release record of a pipeline run
pub struct ReleaseCreator {
    platform: Arc<dyn ReleasePlatform>,
}

impl ReleaseCreator {
    /// Create a release creator backed by `platform`
    pub fn new(platform: Arc<dyn ReleasePlatform>) -> Self {
        Self { platform }
    }

    /// Create the release for `tag`
    ///
    /// Submits title = tag with draft and prerelease both false. Any platform
    /// rejection is returned as-is; there is no retry at this level.
    pub async fn create_release(&self, tag: &VersionTag) -> Result<(ReleaseRecord, ReleaseHandle)> {
        let request = ReleaseRequest::for_tag(tag);
        log::info!("Creating release '{}' for tag {}", request.title, tag);

        let (record, handle) = self.platform.create_release(&request).await?;

        if record.id != handle.release_id {
            return Err(PlatformError::InvalidResponse {
                operation: "create release".to_string(),
                reason: format!(
                    "release id {} does not match upload handle id {}",
                    record.id, handle.release_id
                ),
            }
            .into());
        }

        log::info!("Created release {} ({})", record.id, record.title);
        Ok((record, handle))
    }
}
