//! Fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use hyperlink_release::error::{BuildError, HandoffError, PlatformError};
use hyperlink_release::registry::BuildTarget;
use hyperlink_release::release::{
    ReleaseHandle, ReleaseId, ReleasePlatform, ReleaseRecord, ReleaseRequest, RunId,
    UploadedAsset,
};
use hyperlink_release::{HandoffStore, MemoryHandoff, Toolchain};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// One recorded upload
#[derive(Debug, Clone)]
pub struct Upload {
    pub release_id: ReleaseId,
    pub asset_name: String,
    pub content_type: String,
    pub content: Bytes,
}

/// Platform that records every call
pub struct FakePlatform {
    release_id: u64,
    fail_create: bool,
    failing_uploads: Vec<String>,
    pub creates: Mutex<Vec<ReleaseRequest>>,
    pub uploads: Mutex<Vec<Upload>>,
}

impl FakePlatform {
    pub fn new(release_id: u64) -> Self {
        Self {
            release_id,
            fail_create: false,
            failing_uploads: Vec::new(),
            creates: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Reject release creation with an authentication error
    pub fn rejecting_auth() -> Self {
        Self {
            fail_create: true,
            ..Self::new(0)
        }
    }

    /// Reject the upload of `asset_name`
    pub fn failing_upload(mut self, asset_name: &str) -> Self {
        self.failing_uploads.push(asset_name.to_string());
        self
    }

    pub fn create_count(&self) -> usize {
        self.creates.lock().unwrap().len()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.uploads().into_iter().map(|u| u.asset_name).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ReleasePlatform for FakePlatform {
    async fn create_release(
        &self,
        request: &ReleaseRequest,
    ) -> Result<(ReleaseRecord, ReleaseHandle), PlatformError> {
        self.creates.lock().unwrap().push(request.clone());
        if self.fail_create {
            return Err(PlatformError::AuthenticationFailed {
                reason: "bad credentials".to_string(),
            });
        }

        let id = ReleaseId(self.release_id);
        let record = ReleaseRecord {
            id,
            tag: request.tag.clone(),
            title: request.title.clone(),
            draft: request.draft,
            prerelease: request.prerelease,
            html_url: Some(format!("https://example.test/releases/{}", self.release_id)),
        };
        let handle = ReleaseHandle {
            release_id: id,
            upload_url: format!(
                "https://uploads.example.test/releases/{}/assets{{?name,label}}",
                self.release_id
            ),
        };
        Ok((record, handle))
    }

    async fn upload_asset(
        &self,
        handle: &ReleaseHandle,
        asset_name: &str,
        content_type: &str,
        content: Bytes,
    ) -> Result<UploadedAsset, PlatformError> {
        if self.failing_uploads.iter().any(|name| name == asset_name) {
            return Err(PlatformError::Rejected {
                status: 400,
                message: format!("asset {} rejected", asset_name),
            });
        }

        let size = content.len() as u64;
        self.uploads.lock().unwrap().push(Upload {
            release_id: handle.release_id,
            asset_name: asset_name.to_string(),
            content_type: content_type.to_string(),
            content,
        });
        Ok(UploadedAsset {
            name: asset_name.to_string(),
            size,
            download_url: None,
        })
    }
}

/// Toolchain that writes known bytes to each target's local path
pub struct FakeToolchain {
    project_dir: PathBuf,
    failing: Vec<String>,
    skip_write: Vec<String>,
    delays: HashMap<String, Duration>,
}

impl FakeToolchain {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            failing: Vec::new(),
            skip_write: Vec::new(),
            delays: HashMap::new(),
        }
    }

    /// Fail the build for `platform`
    pub fn failing(mut self, platform: &str) -> Self {
        self.failing.push(platform.to_string());
        self
    }

    /// Report success for `platform` without writing an artifact
    pub fn without_artifact(mut self, platform: &str) -> Self {
        self.skip_write.push(platform.to_string());
        self
    }

    /// Delay the build for `platform`
    pub fn slow(mut self, platform: &str, delay: Duration) -> Self {
        self.delays.insert(platform.to_string(), delay);
        self
    }

    /// Bytes the build for `platform` produces
    pub fn artifact_bytes(platform: &str) -> Vec<u8> {
        let mut bytes = format!("\u{7f}ELF hyperlink for {}\n", platform).into_bytes();
        bytes.extend_from_slice(&[0, 159, 146, 150, 255]);
        bytes
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn build(&self, target: &BuildTarget) -> Result<(), BuildError> {
        if let Some(delay) = self.delays.get(&target.platform) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&target.platform) {
            return Err(BuildError::ToolchainFailed {
                platform: target.platform.clone(),
                reason: "linker error".to_string(),
            });
        }
        if self.skip_write.contains(&target.platform) {
            return Ok(());
        }

        let path = self.project_dir.join(&target.local_path);
        let parent = path.parent().expect("artifact path has a parent");
        tokio::fs::create_dir_all(parent).await.expect("create artifact dir");
        tokio::fs::write(&path, Self::artifact_bytes(&target.platform))
            .await
            .expect("write artifact");
        Ok(())
    }
}

/// Handoff that records the order of publish and fetch completions
pub struct RecordingHandoff {
    inner: MemoryHandoff,
    fail_publish: bool,
    pub events: Mutex<Vec<String>>,
}

impl RecordingHandoff {
    pub fn new(wait: Duration) -> Self {
        Self {
            inner: MemoryHandoff::new(wait),
            fail_publish: false,
            events: Mutex::new(Vec::new()),
        }
    }

    /// Fail every publish with a storage error
    pub fn rejecting_publish(wait: Duration) -> Self {
        Self {
            fail_publish: true,
            ..Self::new(wait)
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl HandoffStore for RecordingHandoff {
    async fn publish(&self, run: &RunId, handle: &ReleaseHandle) -> Result<(), HandoffError> {
        if self.fail_publish {
            return Err(HandoffError::Storage {
                run_id: run.to_string(),
                reason: "disk full".to_string(),
            });
        }
        self.inner.publish(run, handle).await?;
        self.events.lock().unwrap().push("publish".to_string());
        Ok(())
    }

    async fn fetch(&self, run: &RunId) -> Result<ReleaseHandle, HandoffError> {
        self.events.lock().unwrap().push("fetch-start".to_string());
        let handle = self.inner.fetch(run).await?;
        self.events.lock().unwrap().push("fetch-done".to_string());
        Ok(handle)
    }
}
