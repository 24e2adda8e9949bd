//! # Hyperlink Release
//!
//! Tag-triggered release pipeline for the `hyperlink` binaries.
//!
//! A pushed version tag creates exactly one release on the hosting platform,
//! hands the release's upload handle to one build task per registered
//! platform, and each task attaches its artifact under a fixed asset name.
//! One platform failing never takes down the others.
//!
//! ## Usage
//!
//! ```bash
//! hyperlink_release release v1.2.0                  # whole pipeline in one process
//! hyperlink_release create v1.2.0 --run-id 42       # create stage only
//! hyperlink_release build linux --run-id 42         # one build task
//! hyperlink_release status --run-id 42              # inspect a run
//! hyperlink_release finish --run-id 42              # close a split run
//! hyperlink_release validate --registry targets.toml
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod cli;
pub mod error;
pub mod github;
pub mod handoff;
pub mod pipeline;
pub mod registry;
pub mod release;
pub mod state;
pub mod toolchain;

// Re-export main types for public API
pub use cli::Args;
pub use error::{CliError, ReleaseError, Result};
pub use handoff::{FileHandoff, HandoffStore, MemoryHandoff};
pub use pipeline::{FailurePolicy, Orchestrator, PipelineOutcome, TaskReport};
pub use registry::{BuildRegistry, BuildTarget};
pub use release::{ReleaseHandle, ReleasePlatform, ReleaseRecord, RunId, VersionTag};
pub use state::{RunState, StateManager};
pub use toolchain::{CargoToolchain, Toolchain};

use std::collections::HashMap;

/// Snapshot of the process environment
///
/// Everything that reads environment variables goes through this type so
/// tests can supply their own values instead of mutating the real process
/// environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    vars: HashMap<String, String>,
}

impl EnvConfig {
    /// Capture the current process environment
    pub fn from_env() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build from explicit key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `key`, ignoring empty values
    pub fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }
}
