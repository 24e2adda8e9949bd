//! Durable handoff for build tasks running in other processes or machines.
//!
//! Each run's handle is a small JSON record in a shared directory. The record
//! is written to a temp file first and then hard-linked into place, so readers
//! never observe a partial file and a second publish for the same run fails.

use super::{DEFAULT_HANDOFF_TIMEOUT, HandoffStore};
use crate::error::HandoffError;
use crate::release::{ReleaseHandle, RunId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// Interval between checks while waiting for a handle
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// On-disk record
#[derive(Debug, Serialize, Deserialize)]
struct HandoffRecord {
    run_id: RunId,
    handle: ReleaseHandle,
    published_at: chrono::DateTime<chrono::Utc>,
}

/// Handoff persisted under a directory, one file per run
#[derive(Debug, Clone)]
pub struct FileHandoff {
    dir: PathBuf,
    wait: Duration,
    poll_interval: Duration,
}

impl FileHandoff {
    /// Create a store rooted at `dir` with the default wait budget
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            wait: DEFAULT_HANDOFF_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Set how long `fetch` waits for a handle
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Set the polling interval used while waiting
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Path of the record for `run`
    pub fn record_path(&self, run: &RunId) -> PathBuf {
        self.dir.join(format!("{}.handle.json", run))
    }

    /// Remove the run's record at the end of the run
    pub async fn discard(&self, run: &RunId) -> Result<(), HandoffError> {
        match tokio::fs::remove_file(self.record_path(run)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage(run, format!("Failed to remove handle record: {}", e))),
        }
    }

    async fn read_record(&self, run: &RunId, path: &Path) -> Result<Option<ReleaseHandle>, HandoffError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage(run, format!("Failed to read {}: {}", path.display(), e))),
        };

        let record: HandoffRecord =
            serde_json::from_str(&contents).map_err(|e| HandoffError::Corrupted {
                run_id: run.to_string(),
                reason: e.to_string(),
            })?;

        if &record.run_id != run {
            return Err(HandoffError::Corrupted {
                run_id: run.to_string(),
                reason: format!("record belongs to run '{}'", record.run_id),
            });
        }

        Ok(Some(record.handle))
    }
}

fn storage(run: &RunId, reason: String) -> HandoffError {
    HandoffError::Storage {
        run_id: run.to_string(),
        reason,
    }
}

#[async_trait]
impl HandoffStore for FileHandoff {
    async fn publish(&self, run: &RunId, handle: &ReleaseHandle) -> Result<(), HandoffError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage(run, format!("Failed to create {}: {}", self.dir.display(), e)))?;

        let record = HandoffRecord {
            run_id: run.clone(),
            handle: handle.clone(),
            published_at: chrono::Utc::now(),
        };
        let serialized = serde_json::to_string_pretty(&record)
            .map_err(|e| storage(run, format!("Failed to serialize handle: {}", e)))?;

        let final_path = self.record_path(run);
        let temp_path = self
            .dir
            .join(format!(".{}.{}.tmp", run, uuid::Uuid::new_v4()));

        tokio::fs::write(&temp_path, serialized.as_bytes())
            .await
            .map_err(|e| storage(run, format!("Failed to write temp record: {}", e)))?;

        // hard_link refuses to replace an existing file: first publisher wins
        let linked = tokio::fs::hard_link(&temp_path, &final_path).await;
        let _ = tokio::fs::remove_file(&temp_path).await;

        match linked {
            Ok(()) => {
                log::debug!("Published release handle for run {} at {}", run, final_path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(HandoffError::AlreadyPublished {
                run_id: run.to_string(),
            }),
            Err(e) => Err(storage(run, format!("Failed to publish record: {}", e))),
        }
    }

    async fn fetch(&self, run: &RunId) -> Result<ReleaseHandle, HandoffError> {
        let path = self.record_path(run);
        let started = Instant::now();
        // None: the wait budget is beyond any representable instant
        let deadline = started.checked_add(self.wait);

        loop {
            if let Some(handle) = self.read_record(run, &path).await? {
                return Ok(handle);
            }

            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => {
                    return Err(HandoffError::NoHandle {
                        run_id: run.to_string(),
                        waited_ms: now.duration_since(started).as_millis() as u64,
                    });
                }
                Some(deadline) => self.poll_interval.min(deadline - now),
                None => self.poll_interval,
            };

            log::trace!("Waiting for release handle of run {}", run);
            tokio::time::sleep(pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseId;
    use tempfile::TempDir;

    fn handle() -> ReleaseHandle {
        ReleaseHandle {
            release_id: ReleaseId(11),
            upload_url: "https://uploads.example/releases/11/assets{?name,label}".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_then_fetch() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileHandoff::new(dir.path()).with_wait(Duration::ZERO);
        let run = RunId::new("4711").expect("run id");

        store.publish(&run, &handle()).await.expect("publish");
        assert!(store.record_path(&run).exists());
        assert_eq!(store.fetch(&run).await.expect("fetch"), handle());
    }

    #[tokio::test]
    async fn test_second_publish_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileHandoff::new(dir.path());
        let run = RunId::new("4712").expect("run id");

        store.publish(&run, &handle()).await.expect("publish");
        let err = store.publish(&run, &handle()).await.expect_err("write once");
        assert!(matches!(err, HandoffError::AlreadyPublished { .. }));

        // No stray temp files remain
        let leftovers = std::fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_fetch_empty_store_fails_after_wait() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileHandoff::new(dir.path())
            .with_wait(Duration::from_millis(60))
            .with_poll_interval(Duration::from_millis(10));
        let run = RunId::new("missing").expect("run id");

        let err = store.fetch(&run).await.expect_err("nothing published");
        match err {
            HandoffError::NoHandle { waited_ms, .. } => assert!(waited_ms >= 50),
            other => panic!("expected NoHandle, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_sees_late_publish() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileHandoff::new(dir.path())
            .with_wait(Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(10));
        let run = RunId::new("late").expect("run id");

        let reader = {
            let store = store.clone();
            let run = run.clone();
            tokio::spawn(async move { store.fetch(&run).await })
        };

        tokio::time::sleep(Duration::from_millis(40)).await;
        store.publish(&run, &handle()).await.expect("publish");
        assert_eq!(reader.await.expect("join").expect("fetch"), handle());
    }

    #[tokio::test]
    async fn test_unbounded_wait_still_sees_publish() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileHandoff::new(dir.path())
            .with_wait(Duration::from_secs(u64::MAX))
            .with_poll_interval(Duration::from_millis(10));
        let run = RunId::new("patient").expect("run id");

        let reader = {
            let store = store.clone();
            let run = run.clone();
            tokio::spawn(async move { store.fetch(&run).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        store.publish(&run, &handle()).await.expect("publish");
        let fetched = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .expect("fetch returns")
            .expect("join")
            .expect("fetch");
        assert_eq!(fetched, handle());
    }

    #[tokio::test]
    async fn test_corrupted_record_reported() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileHandoff::new(dir.path()).with_wait(Duration::ZERO);
        let run = RunId::new("broken").expect("run id");
        std::fs::write(store.record_path(&run), "https://uploads.example").expect("write");

        let err = store.fetch(&run).await.expect_err("not json");
        assert!(matches!(err, HandoffError::Corrupted { .. }));
    }

    #[tokio::test]
    async fn test_discard_removes_record() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileHandoff::new(dir.path());
        let run = RunId::new("done").expect("run id");

        store.publish(&run, &handle()).await.expect("publish");
        store.discard(&run).await.expect("discard");
        assert!(!store.record_path(&run).exists());
        store.discard(&run).await.expect("discard is idempotent");
    }
}
