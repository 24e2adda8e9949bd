//! Release domain types and the release-creation stage.
//!
//! A pipeline run is identified by a [`RunId`], triggered by a [`VersionTag`],
//! and produces exactly one [`ReleaseRecord`] plus the [`ReleaseHandle`] that
//! build tasks use to attach their artifacts.

mod creator;
mod platform;

pub use creator::ReleaseCreator;
pub use platform::{ReleasePlatform, UploadedAsset, ASSET_CONTENT_TYPE};

use crate::error::{CliError, ReleaseError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag that triggered the pipeline, e.g. `v1.2.0`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionTag(String);

impl VersionTag {
    /// Create a tag, rejecting empty or whitespace-only input
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(ReleaseError::Cli(CliError::InvalidArguments {
                reason: "Version tag must not be empty".to_string(),
            }));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ReleaseError::Cli(CliError::InvalidArguments {
                reason: format!("Version tag '{}' must not contain whitespace", trimmed),
            }));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Extract the tag from a push ref such as `refs/tags/v1.2.0`
    pub fn from_git_ref(git_ref: &str) -> Result<Self> {
        match git_ref.strip_prefix("refs/tags/") {
            Some(tag) => Self::new(tag),
            None => Err(ReleaseError::Cli(CliError::InvalidArguments {
                reason: format!("'{}' is not a tag ref (expected refs/tags/<tag>)", git_ref),
            })),
        }
    }

    /// Tag text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Release title derived from the tag
    pub fn title(&self) -> String {
        self.0.clone()
    }

    /// Parse as a semantic version, ignoring a leading `v`
    pub fn semver(&self) -> Option<semver::Version> {
        let raw = self.0.strip_prefix('v').unwrap_or(&self.0);
        semver::Version::parse(raw).ok()
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VersionTag {
    type Error = ReleaseError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<VersionTag> for String {
    fn from(tag: VersionTag) -> Self {
        tag.0
    }
}

/// Identity of one pipeline run; keys the handoff store and state file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh run id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Use a caller supplied id (e.g. the CI run number)
    ///
    /// Only ASCII alphanumerics, `-`, `_` and `.` are accepted since the id
    /// becomes part of file names.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(ReleaseError::Cli(CliError::InvalidArguments {
                reason: format!(
                    "Invalid run id '{}': use letters, digits, '-', '_' or '.'",
                    id
                ),
            }));
        }
        Ok(Self(id))
    }

    /// Run id text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RunId {
    type Error = ReleaseError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

/// Platform-assigned release identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseId(pub u64);

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference build tasks need to attach assets to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseHandle {
    /// Release the handle belongs to
    pub release_id: ReleaseId,
    /// Upload endpoint as returned by the platform
    pub upload_url: String,
}

/// Parameters of the release creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    /// Tag the release is attached to
    pub tag: VersionTag,
    /// Human title
    pub title: String,
    /// Always false
    pub draft: bool,
    /// Always false
    pub prerelease: bool,
}

impl ReleaseRequest {
    /// Build the request for a tag: title is the tag, published, not a prerelease
    pub fn for_tag(tag: &VersionTag) -> Self {
        Self {
            tag: tag.clone(),
            title: tag.title(),
            draft: false,
            prerelease: false,
        }
    }
}

/// Release as created on the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// Platform identity
    pub id: ReleaseId,
    /// Tag the release belongs to
    pub tag: VersionTag,
    /// Release title
    pub title: String,
    /// Draft flag (always false)
    pub draft: bool,
    /// Prerelease flag (always false)
    pub prerelease: bool,
    /// Public page, if the platform reports one
    pub html_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_tag_rejects_empty() {
        assert!(VersionTag::new("").is_err());
        assert!(VersionTag::new("   ").is_err());
        assert!(VersionTag::new("v1 .2").is_err());
    }

    #[test]
    fn test_version_tag_title_is_tag() {
        let tag = VersionTag::new("v1.2.0").expect("valid tag");
        assert_eq!(tag.title(), "v1.2.0");
        assert_eq!(tag.semver(), Some(semver::Version::new(1, 2, 0)));
    }

    #[test]
    fn test_version_tag_non_semver_is_valid() {
        let tag = VersionTag::new("nightly-2024").expect("valid tag");
        assert_eq!(tag.semver(), None);
    }

    #[test]
    fn test_version_tag_from_git_ref() {
        let tag = VersionTag::from_git_ref("refs/tags/0.1.4").expect("tag ref");
        assert_eq!(tag.as_str(), "0.1.4");
        assert!(VersionTag::from_git_ref("refs/heads/main").is_err());
    }

    #[test]
    fn test_run_id_rejects_path_characters() {
        assert!(RunId::new("../etc").is_err());
        assert!(RunId::new("a/b").is_err());
        assert!(RunId::new("..").is_err());
        assert!(RunId::new("").is_err());
        assert!(RunId::new("12345-attempt.2").is_ok());
    }

    #[test]
    fn test_release_request_policy_is_fixed() {
        let tag = VersionTag::new("v2.0.0").expect("valid tag");
        let request = ReleaseRequest::for_tag(&tag);
        assert!(!request.draft);
        assert!(!request.prerelease);
        assert_eq!(request.title, "v2.0.0");
    }

    #[test]
    fn test_release_handle_json_shape() {
        let handle = ReleaseHandle {
            release_id: ReleaseId(42),
            upload_url: "https://uploads.example/releases/42/assets{?name,label}".to_string(),
        };
        let value = serde_json::to_value(&handle).expect("serialize");
        assert_eq!(value["release_id"], 42);
        assert!(value["upload_url"].as_str().is_some());
    }
}
