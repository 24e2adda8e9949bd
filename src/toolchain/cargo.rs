//! `cargo build --release` toolchain.

use super::Toolchain;
use crate::error::BuildError;
use crate::registry::BuildTarget;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Default upper bound for one platform build
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Number of trailing stderr lines kept for error reports
const STDERR_TAIL_LINES: usize = 40;

/// Runs cargo in the project directory
#[derive(Debug, Clone)]
pub struct CargoToolchain {
    project_dir: PathBuf,
    cargo: PathBuf,
    extra_args: Vec<String>,
    timeout: Duration,
}

impl CargoToolchain {
    /// Create a toolchain building the project at `project_dir`
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            cargo: std::env::var_os("CARGO")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cargo")),
            extra_args: Vec::new(),
            timeout: DEFAULT_BUILD_TIMEOUT,
        }
    }

    /// Extra arguments appended to `cargo build` (e.g. `--locked`)
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Override the build timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments passed to cargo for `target`
    pub fn build_args(&self, target: &BuildTarget) -> Vec<String> {
        let mut args = vec!["build".to_string(), "--release".to_string()];
        if let Some(triple) = &target.rust_target {
            args.push("--target".to_string());
            args.push(triple.clone());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl Toolchain for CargoToolchain {
    async fn build(&self, target: &BuildTarget) -> Result<(), BuildError> {
        let args = self.build_args(target);
        let command_line = format!("{} {}", self.cargo.display(), args.join(" "));
        log::info!("[{}] {}", target.platform, command_line);

        let failed = |reason: String| BuildError::ToolchainFailed {
            platform: target.platform.clone(),
            reason,
        };

        // kill_on_drop: a cancelled task must not leave cargo running
        let mut child = Command::new(&self.cargo)
            .args(&args)
            .current_dir(&self.project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failed(format!("failed to spawn `{}`: {}", command_line, e)))?;

        let platform = target.platform.clone();
        let stderr_handle = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut tail = std::collections::VecDeque::with_capacity(STDERR_TAIL_LINES);
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("[{}] {}", platform, line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail.into_iter().collect::<Vec<_>>().join("\n")
            })
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(failed(format!("waiting for cargo failed: {}", e))),
            Err(_elapsed) => {
                log::warn!(
                    "[{}] build exceeded {}s, terminating",
                    target.platform,
                    self.timeout.as_secs()
                );
                if let Err(e) = child.kill().await {
                    log::warn!("[{}] failed to kill cargo: {}", target.platform, e);
                }
                return Err(BuildError::TimedOut {
                    platform: target.platform.clone(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let stderr_tail = match stderr_handle {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(failed(format!(
                "`{}` exited with {:?}\n{}",
                command_line,
                status.code(),
                stderr_tail
            )));
        }

        Ok(())
    }
}
