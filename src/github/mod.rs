//! GitHub integration for release operations

mod release_manager;
mod retry;

pub use release_manager::{
    GITHUB_API_URL, GitHubReleaseConfig, GitHubReleaseManager, expand_upload_url,
};
pub use retry::retry_with_backoff;
