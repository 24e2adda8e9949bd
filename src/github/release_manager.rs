//! GitHub Release management over the REST API

use super::retry::retry_with_backoff;
use crate::cli::RetryConfig;
use crate::error::{CliError, PlatformError, ReleaseError, Result};
use crate::release::{
    ReleaseHandle, ReleaseId, ReleasePlatform, ReleaseRecord, ReleaseRequest, UploadedAsset,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

/// Default REST endpoint
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Configuration for GitHub releases
#[derive(Debug, Clone)]
pub struct GitHubReleaseConfig {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// GitHub token (from environment or config)
    pub token: Option<String>,
    /// REST API base URL (GitHub Enterprise uses a different host)
    pub api_url: String,
}

impl GitHubReleaseConfig {
    /// Configuration for `owner/repo` on github.com
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: None,
            api_url: GITHUB_API_URL.to_string(),
        }
    }

    /// Parse `owner/repo`
    pub fn from_slug(slug: &str) -> Result<Self> {
        match slug.trim().split_once('/') {
            Some((owner, repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok(Self::new(owner, repo.trim_end_matches(".git")))
            }
            _ => Err(ReleaseError::Cli(CliError::InvalidArguments {
                reason: format!(
                    "Invalid GitHub repository format: '{}'. Expected: owner/repo",
                    slug
                ),
            })),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateReleaseBody<'a> {
    tag_name: &'a str,
    name: &'a str,
    draft: bool,
    prerelease: bool,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    upload_url: String,
    html_url: Option<String>,
    name: Option<String>,
    draft: bool,
    prerelease: bool,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    name: String,
    size: u64,
    browser_download_url: Option<String>,
}

/// GitHub release manager
pub struct GitHubReleaseManager {
    client: Client,
    config: GitHubReleaseConfig,
    token: String,
    retry: RetryConfig,
}

impl GitHubReleaseManager {
    /// Create new GitHub release manager
    pub fn new(
        config: GitHubReleaseConfig,
        env_config: &crate::EnvConfig,
        retry: RetryConfig,
    ) -> Result<Self> {
        let token = config
            .token
            .clone()
            .or_else(|| env_config.get("GH_TOKEN"))
            .or_else(|| env_config.get("GITHUB_TOKEN"))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ReleaseError::Cli(CliError::InvalidArguments {
                reason: "GitHub token not provided. Set GH_TOKEN or GITHUB_TOKEN environment variable or use --github-token".to_string(),
            }))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ReleaseError::Cli(CliError::ExecutionFailed {
                    command: "github_client_init".to_string(),
                    reason: e.to_string(),
                })
            })?;

        Ok(Self {
            client,
            config,
            token,
            retry,
        })
    }

    /// Repository this manager releases to
    pub fn repository(&self) -> String {
        format!("{}/{}", self.config.owner, self.config.repo)
    }

    async fn post_release(&self, request: &ReleaseRequest) -> std::result::Result<ReleaseResponse, PlatformError> {
        let url = format!(
            "{}/repos/{}/{}/releases",
            self.config.api_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo
        );
        let body = CreateReleaseBody {
            tag_name: request.tag.as_str(),
            name: &request.title,
            draft: request.draft,
            prerelease: request.prerelease,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("create release", e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_seconds(response.headers());
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, message, Some(request.tag.as_str())));
        }

        response
            .json::<ReleaseResponse>()
            .await
            .map_err(|e| PlatformError::InvalidResponse {
                operation: "create release".to_string(),
                reason: e.to_string(),
            })
    }

    async fn post_asset(
        &self,
        url: Url,
        content_type: &str,
        content: Bytes,
    ) -> std::result::Result<AssetResponse, PlatformError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, content_type)
            .body(content)
            .send()
            .await
            .map_err(|e| transport_error("upload asset", e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_seconds(response.headers());
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, message, None));
        }

        response
            .json::<AssetResponse>()
            .await
            .map_err(|e| PlatformError::InvalidResponse {
                operation: "upload asset".to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl ReleasePlatform for GitHubReleaseManager {
    async fn create_release(
        &self,
        request: &ReleaseRequest,
    ) -> std::result::Result<(ReleaseRecord, ReleaseHandle), PlatformError> {
        let response = retry_with_backoff(
            || self.post_release(request),
            self.retry.github_api,
            self.retry.base_delay,
            "GitHub release creation",
        )
        .await?;

        let id = ReleaseId(response.id);
        let record = ReleaseRecord {
            id,
            tag: request.tag.clone(),
            title: response.name.unwrap_or_else(|| request.title.clone()),
            draft: response.draft,
            prerelease: response.prerelease,
            html_url: response.html_url,
        };
        let handle = ReleaseHandle {
            release_id: id,
            upload_url: response.upload_url,
        };
        Ok((record, handle))
    }

    async fn upload_asset(
        &self,
        handle: &ReleaseHandle,
        asset_name: &str,
        content_type: &str,
        content: Bytes,
    ) -> std::result::Result<UploadedAsset, PlatformError> {
        let url = expand_upload_url(&handle.upload_url, asset_name)?;

        // Bytes clones share the buffer, so each attempt sends identical content
        let asset = retry_with_backoff(
            || self.post_asset(url.clone(), content_type, content.clone()),
            self.retry.file_uploads,
            self.retry.base_delay,
            &format!("Upload of {}", asset_name),
        )
        .await?;

        Ok(UploadedAsset {
            name: asset.name,
            size: asset.size,
            download_url: asset.browser_download_url,
        })
    }
}

/// Turn the release's `upload_url` template into the URL for one asset
///
/// GitHub returns `.../assets{?name,label}`; the RFC 6570 suffix is dropped
/// and the asset name appended as a query parameter.
pub fn expand_upload_url(template: &str, asset_name: &str) -> std::result::Result<Url, PlatformError> {
    let base = template.split('{').next().unwrap_or(template);
    let mut url = Url::parse(base).map_err(|e| PlatformError::InvalidResponse {
        operation: "upload asset".to_string(),
        reason: format!("invalid upload url '{}': {}", template, e),
    })?;
    url.query_pairs_mut().append_pair("name", asset_name);
    Ok(url)
}

fn transport_error(operation: &str, error: reqwest::Error) -> PlatformError {
    // Connect failures never reached the server; anything later might have
    if error.is_connect() {
        PlatformError::Network {
            operation: operation.to_string(),
            reason: error.to_string(),
        }
    } else {
        PlatformError::Interrupted {
            operation: operation.to_string(),
            reason: error.to_string(),
        }
    }
}

fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Map a non-success status to a platform error
fn classify_status(
    status: StatusCode,
    retry_after: Option<u64>,
    message: String,
    tag: Option<&str>,
) -> PlatformError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => PlatformError::RateLimitExceeded {
            retry_after_seconds: retry_after.unwrap_or(60),
        },
        StatusCode::FORBIDDEN if retry_after.is_some() || message.contains("rate limit") => {
            PlatformError::RateLimitExceeded {
                retry_after_seconds: retry_after.unwrap_or(60),
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::AuthenticationFailed {
            reason: format!("{}: {}", status, message),
        },
        StatusCode::UNPROCESSABLE_ENTITY if message.contains("already_exists") => match tag {
            Some(tag) => PlatformError::DuplicateRelease {
                tag: tag.to_string(),
            },
            None => PlatformError::Rejected {
                status: status.as_u16(),
                message,
            },
        },
        s if s.is_server_error() => PlatformError::Unavailable {
            status: s.as_u16(),
            message,
        },
        s => PlatformError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EnvConfig;
    use crate::release::VersionTag;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Serve `responses` in order, one per connection, counting requests
    async fn stub_server(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nretry-after: 0\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), hits)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut received = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => received.extend_from_slice(&chunk[..n]),
            }
            let Some(end) = received.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&received[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if received.len() >= end + 4 + body_len {
                return;
            }
        }
    }

    fn stub_manager(api_url: String) -> GitHubReleaseManager {
        let mut config = GitHubReleaseConfig::new("untitaker", "hyperlink");
        config.api_url = api_url;
        let env = EnvConfig::from_pairs([("GITHUB_TOKEN", "ghs_example")]);
        let retry = RetryConfig {
            github_api: 3,
            file_uploads: 3,
            base_delay: Duration::from_millis(1),
        };
        GitHubReleaseManager::new(config, &env, retry).expect("manager")
    }

    #[tokio::test]
    async fn test_create_after_gateway_error_is_not_resent() {
        let (api_url, hits) = stub_server(vec![
            (502, r#"{"message":"Bad Gateway"}"#),
            (422, r#"{"errors":[{"code":"already_exists"}]}"#),
        ])
        .await;
        let manager = stub_manager(api_url);
        let tag = VersionTag::new("v1.2.0").expect("tag");

        let err = manager
            .create_release(&ReleaseRequest::for_tag(&tag))
            .await
            .expect_err("gateway error");

        assert!(matches!(err, PlatformError::Unavailable { status: 502, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_retries_rate_limit() {
        let (api_url, hits) = stub_server(vec![
            (429, r#"{"message":"slow down"}"#),
            (
                201,
                r#"{"id":5,"upload_url":"https://uploads.example/releases/5/assets{?name,label}","html_url":null,"name":"v1.2.0","draft":false,"prerelease":false}"#,
            ),
        ])
        .await;
        let manager = stub_manager(api_url);
        let tag = VersionTag::new("v1.2.0").expect("tag");

        let created = manager
            .create_release(&ReleaseRequest::for_tag(&tag))
            .await
            .expect("created after rate limit");

        assert_eq!(created.0.id, ReleaseId(5));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_upload_after_gateway_error_is_not_resent() {
        let (api_url, hits) = stub_server(vec![
            (502, r#"{"message":"Bad Gateway"}"#),
            (422, r#"{"errors":[{"code":"already_exists"}]}"#),
        ])
        .await;
        let manager = stub_manager("http://unused.invalid".to_string());
        let handle = ReleaseHandle {
            release_id: ReleaseId(5),
            upload_url: format!("{}/releases/5/assets{{?name,label}}", api_url),
        };

        let err = manager
            .upload_asset(
                &handle,
                "hyperlink-linux-x86_64",
                "application/octet-stream",
                Bytes::from_static(b"\x7fELF"),
            )
            .await
            .expect_err("gateway error");

        assert!(matches!(err, PlatformError::Unavailable { status: 502, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expand_upload_url_strips_template() {
        let url = expand_upload_url(
            "https://uploads.github.com/repos/untitaker/hyperlink/releases/1/assets{?name,label}",
            "hyperlink-windows-x86_64.exe",
        )
        .expect("valid url");
        assert_eq!(
            url.as_str(),
            "https://uploads.github.com/repos/untitaker/hyperlink/releases/1/assets?name=hyperlink-windows-x86_64.exe"
        );
    }

    #[test]
    fn test_expand_upload_url_rejects_garbage() {
        assert!(expand_upload_url("not a url", "x").is_err());
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, "Bad credentials".into(), None),
            PlatformError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            classify_status(
                StatusCode::UNPROCESSABLE_ENTITY,
                None,
                r#"{"errors":[{"code":"already_exists"}]}"#.into(),
                Some("v1.2.0")
            ),
            PlatformError::DuplicateRelease { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, String::new(), None),
            PlatformError::Unavailable { status: 502, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, Some(5), String::new(), None),
            PlatformError::RateLimitExceeded {
                retry_after_seconds: 5
            }
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, None, "Not Found".into(), None),
            PlatformError::Rejected { status: 404, .. }
        ));
    }

    #[test]
    fn test_config_from_slug() {
        let config = GitHubReleaseConfig::from_slug("untitaker/hyperlink").expect("slug");
        assert_eq!(config.owner, "untitaker");
        assert_eq!(config.repo, "hyperlink");
        assert!(GitHubReleaseConfig::from_slug("hyperlink").is_err());
        assert!(GitHubReleaseConfig::from_slug("a/b/c").is_err());
    }

    #[test]
    fn test_manager_requires_token() {
        let config = GitHubReleaseConfig::new("untitaker", "hyperlink");
        let env = EnvConfig::from_pairs(std::iter::empty::<(&str, &str)>());
        assert!(GitHubReleaseManager::new(config, &env, RetryConfig::none()).is_err());
    }

    #[test]
    fn test_manager_reads_token_from_env() {
        let config = GitHubReleaseConfig::new("untitaker", "hyperlink");
        let env = EnvConfig::from_pairs([("GITHUB_TOKEN", "ghs_example")]);
        let manager = GitHubReleaseManager::new(config, &env, RetryConfig::none())
            .expect("token from env");
        assert_eq!(manager.repository(), "untitaker/hyperlink");
    }
}
