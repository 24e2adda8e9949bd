//! Error types for release pipeline operations.
//!
//! This module defines all error types with actionable error messages and recovery suggestions.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release pipeline operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Main error type for all release pipeline operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Build target registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Release hosting platform errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Release handle handoff errors
    #[error("Handoff error: {0}")]
    Handoff(#[from] HandoffError),

    /// Build task errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// State management errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Build target registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Registry has no targets
    #[error("Build target registry is empty")]
    Empty,

    /// Two targets publish under the same asset name
    #[error("Duplicate asset name '{asset_name}' (used by '{first}' and '{second}')")]
    DuplicateAssetName {
        /// Colliding asset name
        asset_name: String,
        /// Platform registered first
        first: String,
        /// Platform registered second
        second: String,
    },

    /// Two targets share a platform identifier
    #[error("Duplicate platform '{platform}' in build target registry")]
    DuplicatePlatform {
        /// Platform identifier
        platform: String,
    },

    /// Target entry is malformed
    #[error("Invalid build target '{platform}': {reason}")]
    InvalidTarget {
        /// Platform identifier
        platform: String,
        /// Reason for the error
        reason: String,
    },

    /// Requested platform is not registered
    #[error("Platform '{platform}' is not in the build target registry")]
    UnknownPlatform {
        /// Platform identifier
        platform: String,
    },

    /// Registry file could not be read
    #[error("Failed to read registry file {path}: {reason}")]
    ReadFailed {
        /// Path to the registry file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

/// Release hosting platform errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Credentials rejected or missing
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed {
        /// Reason for the error
        reason: String,
    },

    /// A release for this tag already exists
    #[error("Release for tag '{tag}' already exists")]
    DuplicateRelease {
        /// Tag name
        tag: String,
    },

    /// Platform refused the request
    #[error("Request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Platform is temporarily unavailable
    #[error("Platform unavailable ({status}): {message}")]
    Unavailable {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Please wait {retry_after_seconds} seconds before retrying.")]
    RateLimitExceeded {
        /// Seconds to wait
        retry_after_seconds: u64,
    },

    /// Network error talking to the platform
    #[error("Network error during {operation}: {reason}")]
    Network {
        /// Operation that failed
        operation: String,
        /// Reason for the error
        reason: String,
    },

    /// Connection dropped after the request may have reached the platform
    #[error("Request for {operation} interrupted, outcome unknown: {reason}")]
    Interrupted {
        /// Operation that failed
        operation: String,
        /// Reason for the error
        reason: String,
    },

    /// Response did not have the expected shape
    #[error("Unexpected response from {operation}: {reason}")]
    InvalidResponse {
        /// Operation that failed
        operation: String,
        /// Reason for the error
        reason: String,
    },
}

/// Release handle handoff errors
#[derive(Error, Debug)]
pub enum HandoffError {
    /// No handle was published for the run within the wait budget
    #[error("No release handle available for run '{run_id}' after waiting {waited_ms}ms")]
    NoHandle {
        /// Pipeline run identity
        run_id: String,
        /// Time spent waiting in milliseconds
        waited_ms: u64,
    },

    /// A handle was already published for the run
    #[error("Release handle for run '{run_id}' was already published")]
    AlreadyPublished {
        /// Pipeline run identity
        run_id: String,
    },

    /// Stored handle could not be decoded
    #[error("Stored release handle for run '{run_id}' is corrupted: {reason}")]
    Corrupted {
        /// Pipeline run identity
        run_id: String,
        /// Reason for the error
        reason: String,
    },

    /// Backing storage failed
    #[error("Handoff storage failed for run '{run_id}': {reason}")]
    Storage {
        /// Pipeline run identity
        run_id: String,
        /// Reason for the error
        reason: String,
    },
}

/// Build task errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Toolchain reported failure
    #[error("Build for '{platform}' failed: {reason}")]
    ToolchainFailed {
        /// Platform identifier
        platform: String,
        /// Reason for the error
        reason: String,
    },

    /// Toolchain did not finish in time
    #[error("Build for '{platform}' timed out after {seconds}s")]
    TimedOut {
        /// Platform identifier
        platform: String,
        /// Timeout in seconds
        seconds: u64,
    },

    /// Build reported success but the artifact is not where it should be
    #[error("Artifact for '{platform}' not found at {path}")]
    ArtifactMissing {
        /// Platform identifier
        platform: String,
        /// Expected artifact path
        path: PathBuf,
    },

    /// Artifact could not be attached to the release
    #[error("Upload of '{asset_name}' failed: {source}")]
    UploadFailed {
        /// Asset name
        asset_name: String,
        /// Underlying platform error
        #[source]
        source: PlatformError,
    },

    /// Task could not obtain the release handle
    #[error("Build task for '{platform}' could not obtain a release handle: {source}")]
    Handoff {
        /// Platform identifier
        platform: String,
        /// Underlying handoff error
        #[source]
        source: HandoffError,
    },

    /// Task was cancelled before completing
    #[error("Build task for '{platform}' was cancelled")]
    Cancelled {
        /// Platform identifier
        platform: String,
    },

    /// Task panicked or was aborted by the runtime
    #[error("Build task for '{platform}' aborted: {reason}")]
    Aborted {
        /// Platform identifier
        platform: String,
        /// Reason for the error
        reason: String,
    },
}

/// State management errors
#[derive(Error, Debug)]
pub enum StateError {
    /// State file corrupted
    #[error("State file corrupted: {reason}")]
    Corrupted {
        /// Reason for the error
        reason: String,
    },

    /// State file not found
    #[error("State file not found for run '{run_id}'.")]
    NotFound {
        /// Pipeline run identity
        run_id: String,
    },

    /// State version mismatch
    #[error("State file version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Found version
        found: String,
    },

    /// Run already created its release
    #[error("Run '{run_id}' already created release {release_id}; trigger a new run instead")]
    AlreadyReleased {
        /// Pipeline run identity
        run_id: String,
        /// Existing release id
        release_id: u64,
    },

    /// Failed to save state
    #[error("Failed to save state: {reason}")]
    SaveFailed {
        /// Reason for the error
        reason: String,
    },

    /// Failed to load state
    #[error("Failed to load state: {reason}")]
    LoadFailed {
        /// Reason for the error
        reason: String,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Missing required argument
    #[error("Missing required argument: {argument}")]
    MissingArgument {
        /// Argument name
        argument: String,
    },

    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },
}

impl PlatformError {
    /// Whether the failure is temporary on the platform side
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::Unavailable { .. }
                | PlatformError::RateLimitExceeded { .. }
                | PlatformError::Network { .. }
                | PlatformError::Interrupted { .. }
        )
    }

    /// Whether the platform certainly did not apply the request
    ///
    /// Only these failures may be resent. A 5xx or a dropped connection can
    /// follow a committed write, so resending could create a second release
    /// or collide with an asset that was already stored.
    pub fn is_safe_to_resend(&self) -> bool {
        matches!(
            self,
            PlatformError::RateLimitExceeded { .. } | PlatformError::Network { .. }
        )
    }
}

impl ReleaseError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Registry(RegistryError::DuplicateAssetName { asset_name, .. }) => vec![
                format!("Give each target a distinct asset name (collision on '{asset_name}')"),
                "Run `hyperlink_release validate --registry <FILE>` after editing".to_string(),
            ],
            ReleaseError::Platform(PlatformError::AuthenticationFailed { .. }) => vec![
                "Set GH_TOKEN or GITHUB_TOKEN, or pass --github-token".to_string(),
                "Verify the token has `contents: write` permission on the repository".to_string(),
            ],
            ReleaseError::Platform(PlatformError::DuplicateRelease { tag }) => vec![
                format!("Delete the existing release for {tag} before re-triggering"),
                "Push a new tag instead of re-running the pipeline".to_string(),
            ],
            ReleaseError::Platform(
                PlatformError::Unavailable { .. } | PlatformError::Interrupted { .. },
            ) => vec![
                "The request may have been applied before it failed".to_string(),
                "Check the repository's releases and assets before re-running".to_string(),
            ],
            ReleaseError::Platform(PlatformError::RateLimitExceeded {
                retry_after_seconds,
            }) => vec![format!("Wait {} seconds before retrying", retry_after_seconds)],
            ReleaseError::Handoff(HandoffError::NoHandle { .. }) => vec![
                "Make sure the `create` stage finished for this run id".to_string(),
                "Increase --handoff-timeout if the create stage is slow".to_string(),
            ],
            ReleaseError::State(StateError::AlreadyReleased { .. }) => vec![
                "Use a fresh --run-id; a run creates its release exactly once".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            ReleaseError::Platform(e) => e.is_transient(),
            ReleaseError::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_platform_errors_are_recoverable() {
        let err = ReleaseError::Platform(PlatformError::Unavailable {
            status: 502,
            message: "bad gateway".to_string(),
        });
        assert!(err.is_recoverable());

        let err = ReleaseError::Platform(PlatformError::AuthenticationFailed {
            reason: "bad credentials".to_string(),
        });
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_only_unapplied_requests_are_resent() {
        let gateway = PlatformError::Unavailable {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert!(gateway.is_transient());
        assert!(!gateway.is_safe_to_resend());

        let dropped = PlatformError::Interrupted {
            operation: "create release".to_string(),
            reason: "connection reset".to_string(),
        };
        assert!(!dropped.is_safe_to_resend());

        assert!(PlatformError::RateLimitExceeded {
            retry_after_seconds: 1
        }
        .is_safe_to_resend());
        assert!(PlatformError::Network {
            operation: "create release".to_string(),
            reason: "connection refused".to_string(),
        }
        .is_safe_to_resend());
    }

    #[test]
    fn test_duplicate_asset_suggestion_names_asset() {
        let err = ReleaseError::Registry(RegistryError::DuplicateAssetName {
            asset_name: "hyperlink-linux-x86_64".to_string(),
            first: "linux".to_string(),
            second: "linux-musl".to_string(),
        });
        let suggestions = err.recovery_suggestions();
        assert!(suggestions[0].contains("hyperlink-linux-x86_64"));
    }
}
