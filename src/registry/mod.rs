//! Build target registry.
//!
//! The registry is the static build matrix: one [`BuildTarget`] per platform,
//! each naming where its build leaves the binary and what the release asset is
//! called. Asset names must be unique, otherwise uploads would overwrite each
//! other on the release.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// One entry of the build matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Platform identifier (`linux`, `macos`, `windows`, ...)
    pub platform: String,
    /// Where a successful build leaves the artifact, relative to the project dir
    pub local_path: PathBuf,
    /// Name the artifact is published under
    pub asset_name: String,
    /// Rust target triple passed to the toolchain, if not the host default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rust_target: Option<String>,
}

impl BuildTarget {
    /// Create a target built for the host triple
    pub fn new(
        platform: impl Into<String>,
        local_path: impl Into<PathBuf>,
        asset_name: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            local_path: local_path.into(),
            asset_name: asset_name.into(),
            rust_target: None,
        }
    }

    /// Set the Rust target triple
    pub fn with_rust_target(mut self, triple: impl Into<String>) -> Self {
        self.rust_target = Some(triple.into());
        self
    }

    fn validate(&self) -> std::result::Result<(), RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidTarget {
            platform: self.platform.clone(),
            reason: reason.to_string(),
        };

        if self.platform.trim().is_empty() {
            return Err(invalid("platform identifier is empty"));
        }
        if self.asset_name.trim().is_empty() {
            return Err(invalid("asset name is empty"));
        }
        if self.asset_name.contains(['/', '\\']) {
            return Err(invalid("asset name must not contain path separators"));
        }
        if self.local_path.as_os_str().is_empty() {
            return Err(invalid("local artifact path is empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(rename = "target", default)]
    targets: Vec<BuildTarget>,
}

/// Validated set of build targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRegistry {
    targets: Vec<BuildTarget>,
}

impl BuildRegistry {
    /// Validate and wrap a list of targets
    ///
    /// Rejects an empty list, malformed entries, duplicate platforms and
    /// duplicate asset names.
    pub fn new(targets: Vec<BuildTarget>) -> Result<Self> {
        if targets.is_empty() {
            return Err(RegistryError::Empty.into());
        }

        let mut by_asset: HashMap<&str, &str> = HashMap::new();
        let mut platforms: HashSet<&str> = HashSet::new();

        for target in &targets {
            target.validate()?;

            if !platforms.insert(target.platform.as_str()) {
                return Err(RegistryError::DuplicatePlatform {
                    platform: target.platform.clone(),
                }
                .into());
            }

            if let Some(first) = by_asset.insert(target.asset_name.as_str(), target.platform.as_str())
            {
                return Err(RegistryError::DuplicateAssetName {
                    asset_name: target.asset_name.clone(),
                    first: first.to_string(),
                    second: target.platform.clone(),
                }
                .into());
            }
        }

        Ok(Self { targets })
    }

    /// The reference three-platform matrix
    pub fn reference() -> Self {
        Self {
            targets: vec![
                BuildTarget::new(
                    "linux",
                    "target/x86_64-unknown-linux-musl/release/hyperlink",
                    "hyperlink-linux-x86_64",
                )
                .with_rust_target("x86_64-unknown-linux-musl"),
                BuildTarget::new("macos", "target/release/hyperlink", "hyperlink-mac-x86_64"),
                BuildTarget::new(
                    "windows",
                    "target/release/hyperlink.exe",
                    "hyperlink-windows-x86_64.exe",
                ),
            ],
        }
    }

    /// Parse a registry from TOML (`[[target]]` tables)
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(contents)?;
        Self::new(file.targets)
    }

    /// Load a registry file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| RegistryError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        log::debug!("Loaded build target registry from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Look up a target by platform identifier
    pub fn get(&self, platform: &str) -> Result<&BuildTarget> {
        self.targets
            .iter()
            .find(|t| t.platform == platform)
            .ok_or_else(|| {
                RegistryError::UnknownPlatform {
                    platform: platform.to_string(),
                }
                .into()
            })
    }

    /// All targets in registration order
    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    /// Number of targets
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always false for a validated registry
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
