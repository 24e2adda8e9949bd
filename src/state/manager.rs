//! State persistence for pipeline runs.
//!
//! Each run's state lives in `<state_dir>/<run_id>.state.json`. Split
//! pipelines have several jobs writing the same file, so every write happens
//! under an exclusive lock on `<run_id>.state.lock` and goes through a
//! per-writer temp file and an atomic rename.

use crate::error::{Result, StateError};
use crate::release::RunId;
use crate::state::RunState;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Default time to wait for another writer to release the lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between lock attempts
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// State manager for persistent run state
#[derive(Debug, Clone)]
pub struct StateManager {
    state_dir: PathBuf,
    lock_timeout: Duration,
}

/// Result of state saving operation
#[derive(Debug)]
pub struct SaveStateResult {
    /// Size of saved state file in bytes
    pub file_size_bytes: u64,
    /// Duration of save operation
    pub save_duration: Duration,
}

/// Exclusive hold on one run's state file, released on drop
pub struct StateLock {
    #[cfg(unix)]
    _flock: nix::fcntl::Flock<std::fs::File>,
    #[cfg(not(unix))]
    path: PathBuf,
}

#[cfg(not(unix))]
impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

impl StateManager {
    /// Create a state manager storing files under `state_dir`
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override how long a write waits for the lock
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the state file for `run`
    pub fn state_path(&self, run: &RunId) -> PathBuf {
        self.state_dir.join(format!("{}.state.json", run))
    }

    fn lock_path(&self, run: &RunId) -> PathBuf {
        self.state_dir.join(format!("{}.state.lock", run))
    }

    /// Check if state exists for `run`
    pub fn state_exists(&self, run: &RunId) -> bool {
        self.state_path(run).exists()
    }

    /// Take the exclusive write lock for `run`, waiting up to the lock timeout
    pub async fn lock(&self, run: &RunId) -> Result<StateLock> {
        tokio::fs::create_dir_all(&self.state_dir)
            .await
            .map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to create {}: {}", self.state_dir.display(), e),
            })?;

        let path = self.lock_path(run);
        let started = Instant::now();
        loop {
            if let Some(lock) = try_lock(&path)? {
                return Ok(lock);
            }
            if started.elapsed() >= self.lock_timeout {
                return Err(StateError::SaveFailed {
                    reason: format!(
                        "Timeout waiting for state lock {} after {}ms",
                        path.display(),
                        self.lock_timeout.as_millis()
                    ),
                }
                .into());
            }
            tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
        }
    }

    /// Save run state
    ///
    /// Task outcomes that another job recorded for the same release and that
    /// `state` does not hold yet are merged into `state` before writing.
    pub async fn save_state(&self, state: &mut RunState) -> Result<SaveStateResult> {
        state.validate()?;
        let _lock = self.lock(&state.run_id).await?;

        if let Some(release) = &state.release
            && let Ok(on_disk) = self.load_state(&state.run_id).await
            && on_disk.release.as_ref().map(|r| r.id) == Some(release.id)
        {
            for (platform, record) in on_disk.tasks {
                state.tasks.entry(platform).or_insert(record);
            }
            state.save_version = state.save_version.max(on_disk.save_version);
        }

        self.write_locked(state).await
    }

    /// Load, modify and save the state of `run` as one locked step
    pub async fn update<F>(&self, run: &RunId, modify: F) -> Result<RunState>
    where
        F: FnOnce(&mut RunState),
    {
        let _lock = self.lock(run).await?;
        let mut state = self.load_state(run).await?;
        modify(&mut state);
        self.write_locked(&mut state).await?;
        Ok(state)
    }

    async fn write_locked(&self, state: &mut RunState) -> Result<SaveStateResult> {
        let start_time = SystemTime::now();

        state.validate()?;
        state.save_version += 1;

        let serialized =
            serde_json::to_string_pretty(state).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to serialize state: {}", e),
            })?;

        let state_path = self.state_path(&state.run_id);
        let temp_path = self
            .state_dir
            .join(format!(".{}.{}.tmp", state.run_id, uuid::Uuid::new_v4()));

        tokio::fs::write(&temp_path, serialized.as_bytes())
            .await
            .map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to write state: {}", e),
            })?;

        if let Err(e) = tokio::fs::rename(&temp_path, &state_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StateError::SaveFailed {
                reason: format!("Failed to rename temp file: {}", e),
            }
            .into());
        }

        let file_size_bytes = tokio::fs::metadata(&state_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        log::debug!(
            "Saved state for run {} (save #{})",
            state.run_id,
            state.save_version
        );

        Ok(SaveStateResult {
            file_size_bytes,
            save_duration: start_time.elapsed().unwrap_or_default(),
        })
    }

    /// Load run state
    pub async fn load_state(&self, run: &RunId) -> Result<RunState> {
        let path = self.state_path(run);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateError::NotFound {
                    run_id: run.to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(StateError::LoadFailed {
                    reason: format!("Failed to read {}: {}", path.display(), e),
                }
                .into());
            }
        };

        let state: RunState = serde_json::from_str(&contents).map_err(|e| StateError::Corrupted {
            reason: format!("Failed to deserialize state: {}", e),
        })?;

        state.validate()?;
        Ok(state)
    }

    /// Delete the state and lock files for `run`
    pub async fn cleanup_state(&self, run: &RunId) -> Result<()> {
        let _lock = self.lock(run).await?;
        match tokio::fs::remove_file(self.state_path(run)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StateError::SaveFailed {
                    reason: format!("Failed to remove state file: {}", e),
                }
                .into());
            }
        }
        let _ = tokio::fs::remove_file(self.lock_path(run)).await;
        Ok(())
    }
}

#[cfg(unix)]
fn try_lock(path: &Path) -> Result<Option<StateLock>> {
    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};

    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to open lock file {}: {}", path.display(), e),
        })?;

    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(flock) => Ok(Some(StateLock { _flock: flock })),
        Err((_, errno)) if errno == Errno::EWOULDBLOCK => Ok(None),
        Err((_, errno)) => Err(StateError::SaveFailed {
            reason: format!("flock error on {}: {}", path.display(), errno),
        }
        .into()),
    }
}

#[cfg(not(unix))]
fn try_lock(path: &Path) -> Result<Option<StateLock>> {
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(_) => Ok(Some(StateLock {
            path: path.to_path_buf(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(StateError::SaveFailed {
            reason: format!("Failed to create lock file {}: {}", path.display(), e),
        }
        .into()),
    }
}
