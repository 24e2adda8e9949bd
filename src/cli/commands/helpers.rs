//! Shared helper functions for command execution.

use crate::EnvConfig;
use crate::cli::{Args, RetryConfig, RuntimeConfig};
use crate::error::{CliError, ReleaseError, Result};
use crate::github::{GitHubReleaseConfig, GitHubReleaseManager};
use crate::pipeline::{FailurePolicy, PipelineOutcome};
use crate::registry::BuildRegistry;
use crate::release::{ReleasePlatform, RunId, VersionTag};
use crate::toolchain::CargoToolchain;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Print recovery suggestions for `error`
pub(super) fn print_suggestions(config: &RuntimeConfig, error: &ReleaseError) {
    if error.is_recoverable() {
        config.warning_println("This failure is likely temporary");
    }
    let suggestions = error.recovery_suggestions();
    if !suggestions.is_empty() {
        config.println("\n💡 Recovery suggestions:");
        for suggestion in suggestions {
            config.println(&format!("  • {}", suggestion));
        }
    }
}

/// Tag from the argument, else from GITHUB_REF
pub(super) fn resolve_tag(tag: Option<&str>, env: &EnvConfig) -> Result<VersionTag> {
    if let Some(tag) = tag {
        return VersionTag::new(tag);
    }
    match env.get("GITHUB_REF") {
        Some(git_ref) => VersionTag::from_git_ref(&git_ref),
        None => Err(ReleaseError::Cli(CliError::MissingArgument {
            argument: "TAG (or GITHUB_REF=refs/tags/<tag>)".to_string(),
        })),
    }
}

/// Registry from --registry, else the built-in matrix
pub(super) fn load_registry(args: &Args) -> Result<BuildRegistry> {
    match &args.registry {
        Some(path) => BuildRegistry::load(path),
        None => Ok(BuildRegistry::reference()),
    }
}

/// GitHub adapter for --repo / GITHUB_REPOSITORY
pub(super) fn github_platform(args: &Args, env: &EnvConfig) -> Result<Arc<dyn ReleasePlatform>> {
    let slug = args
        .repo
        .clone()
        .or_else(|| env.get("GITHUB_REPOSITORY"))
        .ok_or_else(|| {
            ReleaseError::Cli(CliError::MissingArgument {
                argument: "--repo owner/repo (or GITHUB_REPOSITORY)".to_string(),
            })
        })?;

    let mut github_config = GitHubReleaseConfig::from_slug(&slug)?;
    github_config.token = args.github_token.clone();

    let retry = RetryConfig::from_env(env);
    retry.validate().map_err(|reason| {
        ReleaseError::Cli(CliError::InvalidArguments { reason })
    })?;

    let manager = GitHubReleaseManager::new(github_config, env, retry)?;
    log::debug!("Releasing to {}", manager.repository());
    Ok(Arc::new(manager))
}

/// Cargo toolchain rooted at --project-dir
pub(super) fn cargo_toolchain(args: &Args) -> CargoToolchain {
    CargoToolchain::new(&args.project_dir)
        .with_args(args.cargo_args.clone())
        .with_timeout(Duration::from_secs(args.build_timeout))
}

/// Handle wait budget from --handoff-timeout
pub(super) fn handoff_timeout(args: &Args) -> Duration {
    Duration::from_secs(args.handoff_timeout)
}

/// Failure policy from --cancel-siblings
pub(super) fn failure_policy(args: &Args) -> FailurePolicy {
    if args.cancel_siblings {
        FailurePolicy::CancelSiblings
    } else {
        FailurePolicy::Independent
    }
}

/// Run id from --run-id, else a fresh one
pub(super) fn resolve_run_id(run_id: Option<&str>) -> Result<RunId> {
    match run_id {
        Some(id) => RunId::new(id),
        None => Ok(RunId::generate()),
    }
}

/// Token cancelled on Ctrl-C
pub(super) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling build tasks");
            trigger.cancel();
        }
    });
    token
}

/// Print the final pipeline outcome
pub(super) fn report_outcome(config: &RuntimeConfig, outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Success { release, assets } => {
            config.success_println(&format!(
                "Release {} ({}) published with {} asset(s)",
                release.title,
                release.id,
                assets.len()
            ));
            for asset in assets {
                config.indent(&format!("✓ {} ({} bytes)", asset.name, asset.size));
            }
            if let Some(url) = &release.html_url {
                config.println(&format!("🔗 {}", url));
            }
        }
        PipelineOutcome::PartialFailure {
            release,
            succeeded,
            failed,
        } => {
            config.warning_println(&format!(
                "Release {} ({}) is missing {} of {} asset(s)",
                release.title,
                release.id,
                failed.len(),
                failed.len() + succeeded.len()
            ));
            for asset in succeeded {
                config.indent(&format!("✓ {} ({} bytes)", asset.name, asset.size));
            }
            for failure in failed {
                config.error_println(&format!("{}: {}", failure.platform, failure.error));
            }
        }
        PipelineOutcome::Fatal { error } => {
            config.error_println(&format!("Release creation failed: {}", error));
            print_suggestions(config, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_argument_wins_over_git_ref() {
        let env = EnvConfig::from_pairs([("GITHUB_REF", "refs/tags/v9.9.9")]);
        let tag = resolve_tag(Some("v1.2.0"), &env).expect("tag");
        assert_eq!(tag.as_str(), "v1.2.0");
    }

    #[test]
    fn test_tag_from_git_ref() {
        let env = EnvConfig::from_pairs([("GITHUB_REF", "refs/tags/v1.2.0")]);
        let tag = resolve_tag(None, &env).expect("tag");
        assert_eq!(tag.as_str(), "v1.2.0");
    }

    #[test]
    fn test_branch_ref_is_not_a_tag() {
        let env = EnvConfig::from_pairs([("GITHUB_REF", "refs/heads/main")]);
        assert!(resolve_tag(None, &env).is_err());
        assert!(resolve_tag(None, &EnvConfig::default()).is_err());
    }
}
