//! Build toolchain capability.
//!
//! The pipeline only relies on one contract: when `build` succeeds, a readable
//! artifact exists at the target's `local_path`.

mod cargo;

pub use cargo::{CargoToolchain, DEFAULT_BUILD_TIMEOUT};

use crate::error::BuildError;
use crate::registry::BuildTarget;
use async_trait::async_trait;

/// Builds the artifact for one target
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Build `target`, leaving the artifact at `target.local_path`
    async fn build(&self, target: &BuildTarget) -> Result<(), BuildError>;
}
