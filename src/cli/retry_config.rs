//! Retry configuration for platform transport operations.
//!
//! The pipeline core never retries. Only the GitHub transport retries
//! requests the platform never applied (connection failures, rate limits),
//! bounded here.

use std::time::Duration;

/// Configuration for transport retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Max retries for GitHub API calls (create release)
    pub github_api: u32,

    /// Max retries for asset uploads
    pub file_uploads: u32,

    /// First backoff delay; doubles on each retry
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            github_api: 3,
            file_uploads: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            github_api: 0,
            file_uploads: 0,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Parse retry count from environment variable with clamping to maximum
    fn parse_retry_env(env: &crate::EnvConfig, var_name: &str, default: u32, max: u32) -> u32 {
        env.get(var_name)
            .and_then(|s| s.trim().parse::<u32>().ok())
            .map(|v| v.min(max))
            .unwrap_or(default)
    }

    /// Create config from environment variables with fallback to defaults
    pub fn from_env(env: &crate::EnvConfig) -> Self {
        let defaults = Self::default();
        Self {
            github_api: Self::parse_retry_env(env, "HYPERLINK_RETRY_GITHUB", defaults.github_api, 10),
            file_uploads: Self::parse_retry_env(
                env,
                "HYPERLINK_RETRY_UPLOADS",
                defaults.file_uploads,
                20,
            ),
            base_delay: defaults.base_delay,
        }
    }

    /// Validate retry counts are reasonable
    pub fn validate(&self) -> Result<(), String> {
        if self.github_api > 10 {
            return Err(format!(
                "github_api retry count too high: {} (max: 10)",
                self.github_api
            ));
        }
        if self.file_uploads > 20 {
            return Err(format!(
                "file_uploads retry count too high: {} (max: 20)",
                self.file_uploads
            ));
        }
        Ok(())
    }
}
