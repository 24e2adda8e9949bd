//! State management for pipeline runs.
//!
//! Persisted run state backs the `status` command and keeps a run from
//! creating its release twice.

mod manager;
mod run_state;

pub use manager::{DEFAULT_LOCK_TIMEOUT, SaveStateResult, StateLock, StateManager};
pub use run_state::{RunCheckpoint, RunPhase, RunState, STATE_FORMAT_VERSION, TaskRecord, TaskStatus};
