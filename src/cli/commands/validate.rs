//! Validate command implementation.
//!
//! Loads the build target registry and reports whether it is usable.

use super::helpers;
use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;

/// Execute validate command
pub(super) async fn execute_validate(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let source = match &args.registry {
        Some(path) => path.display().to_string(),
        None => "built-in registry".to_string(),
    };

    let registry = helpers::load_registry(args)?;
    config.println(&format!("📋 {} ({} target(s))", source, registry.len()));

    let mut warnings = 0;
    for target in registry.targets() {
        config.indent(&format!(
            "{} → {} from {}",
            target.platform,
            target.asset_name,
            target.local_path.display()
        ));

        // Cross builds land under target/<triple>/
        if let Some(triple) = &target.rust_target
            && !target.local_path.components().any(|c| c.as_os_str() == triple.as_str())
        {
            config.warning_println(&format!(
                "{}: rust_target '{}' does not appear in local_path {}",
                target.platform,
                triple,
                target.local_path.display()
            ));
            warnings += 1;
        }
    }

    if warnings == 0 {
        config.success_println("Registry is valid");
    } else {
        config.success_println(&format!("Registry is valid ({} warning(s))", warnings));
    }
    Ok(0)
}
