//! In-process handoff backed by `tokio::sync::watch`.

use super::{DEFAULT_HANDOFF_TIMEOUT, HandoffStore};
use crate::error::HandoffError;
use crate::release::{ReleaseHandle, RunId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, watch};

/// Handoff for tasks running in the same process
#[derive(Debug)]
pub struct MemoryHandoff {
    channels: Mutex<HashMap<RunId, watch::Sender<Option<ReleaseHandle>>>>,
    wait: Duration,
}

impl MemoryHandoff {
    /// Create a store whose `fetch` waits at most `wait`
    pub fn new(wait: Duration) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            wait,
        }
    }

    async fn channel(&self, run: &RunId) -> watch::Sender<Option<ReleaseHandle>> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(run.clone())
            .or_insert_with(|| watch::channel(None).0)
            .clone()
    }
}

impl Default for MemoryHandoff {
    fn default() -> Self {
        Self::new(DEFAULT_HANDOFF_TIMEOUT)
    }
}

#[async_trait]
impl HandoffStore for MemoryHandoff {
    async fn publish(&self, run: &RunId, handle: &ReleaseHandle) -> Result<(), HandoffError> {
        let sender = self.channel(run).await;

        let published = sender.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(handle.clone());
            true
        });

        if !published {
            return Err(HandoffError::AlreadyPublished {
                run_id: run.to_string(),
            });
        }

        log::debug!("Published release handle for run {}", run);
        Ok(())
    }

    async fn fetch(&self, run: &RunId) -> Result<ReleaseHandle, HandoffError> {
        let mut receiver = self.channel(run).await.subscribe();
        let started = tokio::time::Instant::now();

        let no_handle = || HandoffError::NoHandle {
            run_id: run.to_string(),
            waited_ms: started.elapsed().as_millis() as u64,
        };

        match tokio::time::timeout(self.wait, receiver.wait_for(Option::is_some)).await {
            Ok(Ok(slot)) => (*slot).clone().ok_or_else(no_handle),
            // The sender lives in the map for the store's lifetime, so a
            // closed channel only happens while the store is being dropped.
            Ok(Err(_closed)) => Err(no_handle()),
            Err(_elapsed) => Err(no_handle()),
        }
    }
}
