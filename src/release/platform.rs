//! Capability interface of the release hosting platform.

use super::{ReleaseHandle, ReleaseRecord, ReleaseRequest};
use crate::error::PlatformError;
use async_trait::async_trait;
use bytes::Bytes;

/// Content type used for every uploaded binary
pub const ASSET_CONTENT_TYPE: &str = "application/octet-stream";

/// Asset attached to a release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    /// Name the platform serves the asset under
    pub name: String,
    /// Size in bytes as reported by the platform
    pub size: u64,
    /// Download URL, if reported
    pub download_url: Option<String>,
}

/// Release hosting platform (GitHub in production, fakes in tests)
#[async_trait]
pub trait ReleasePlatform: Send + Sync {
    /// Create a published release and return it with its upload handle
    async fn create_release(
        &self,
        request: &ReleaseRequest,
    ) -> Result<(ReleaseRecord, ReleaseHandle), PlatformError>;

    /// Attach `content` to the release behind `handle` as `asset_name`
    ///
    /// The content must be sent unchanged.
    async fn upload_asset(
        &self,
        handle: &ReleaseHandle,
        asset_name: &str,
        content_type: &str,
        content: Bytes,
    ) -> Result<UploadedAsset, PlatformError>;
}
