//! Polling seam between the task monitor and the backend
//!
//! The monitor never talks to the network directly; it fetches through this
//! trait, which [`GenerationClient`](crate::client::GenerationClient)
//! implements in production and test doubles implement in the monitor's
//! test suite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{TaskId, TaskStatus};

/// One status/progress observation for a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Status as reported by the backend
    pub status: TaskStatus,
    /// Progress as reported by the backend, passed through unclamped
    pub progress: u32,
}

/// One log observation for a task
///
/// `logs` is the full accumulated log text, not a delta.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsUpdate {
    /// Full accumulated log text
    pub logs: String,
}

/// Source of status and log observations for a monitored task
#[async_trait]
pub trait TaskPoller: Send + Sync {
    /// Fetch the current status and progress for `id`
    async fn fetch_status(&self, id: &TaskId) -> Result<StatusUpdate>;

    /// Fetch the full accumulated log text for `id`
    async fn fetch_logs(&self, id: &TaskId) -> Result<LogsUpdate>;
}
