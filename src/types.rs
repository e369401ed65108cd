//! Core types for rtlgen-client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ValidationError;

/// Opaque identifier for a backend generation task
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable reference to one backend generation job
///
/// Obtained from [`GenerationClient::submit_prompt`](crate::client::GenerationClient::submit_prompt)
/// and handed to a [`TaskMonitor`](crate::monitor::TaskMonitor) to begin polling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    /// The backend job id
    pub id: TaskId,
    /// When this handle was created (client-side clock)
    pub created_at: DateTime<Utc>,
}

impl TaskHandle {
    /// Create a handle for the given task id, stamped with the current time
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle state of a generation task as reported by the backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// No task bound, or the task has not started yet
    #[default]
    Idle,
    /// Generation in progress
    Running,
    /// Generation finished successfully
    Completed,
    /// Generation failed
    Failed,
    /// Backend reported a status string this client does not recognize
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Whether this status means the backend job will make no further progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Fully-formed, read-only view of a monitored task
///
/// Produced only by the [`TaskMonitor`](crate::monitor::TaskMonitor); each
/// update replaces the previous snapshot wholesale, so readers never observe
/// a partially-written state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Last status reported by the backend
    pub status: TaskStatus,
    /// Last progress value reported by the backend, passed through unclamped
    pub progress: u32,
    /// Full accumulated log text (replaced, not appended, on each fetch)
    pub logs: String,
}

/// A user-selected design document: name, size, and byte payload
///
/// Immutable once created. Cloning is cheap; the payload is shared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    name: String,
    size_bytes: u64,
    // Payload bytes are not part of the persisted snapshot; a reloaded
    // package carries metadata only.
    #[serde(skip)]
    payload: Arc<[u8]>,
}

impl FileRef {
    /// Create a file reference from a name and its byte payload
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size_bytes: payload.len() as u64,
            payload: Arc::from(payload),
        }
    }

    /// The file name as selected by the user
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// The byte payload
    pub fn payload(&self) -> &Arc<[u8]> {
        &self.payload
    }

    /// Content digest identifying this file's bytes
    ///
    /// Two refs with identical payloads share a digest, which is what the
    /// [`ArtifactResolver`](crate::artifact::ArtifactResolver) keys its
    /// handle cache on.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.payload);
        format!("{:x}", hasher.finalize())
    }
}

/// Classification of an uploaded document within a module
///
/// Closed enumeration: unknown keys are rejected at the string boundary
/// rather than silently accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryKey {
    /// Design specification
    Spec,
    /// Testbench requirements
    TestbenchRequirements,
    /// Functional design document
    FunctionalDesign,
    /// Architecture design document
    ArchitectureDesign,
    /// Protocol description
    Protocol,
    /// UVM verification collateral
    Uvm,
    /// Formal verification collateral
    FormalVerification,
    /// Assertion collateral
    Assertions,
    /// Inter-module communication description (sub-modules)
    Communication,
}

impl CategoryKey {
    /// Every known category, in declaration order
    pub const ALL: [CategoryKey; 9] = [
        CategoryKey::Spec,
        CategoryKey::TestbenchRequirements,
        CategoryKey::FunctionalDesign,
        CategoryKey::ArchitectureDesign,
        CategoryKey::Protocol,
        CategoryKey::Uvm,
        CategoryKey::FormalVerification,
        CategoryKey::Assertions,
        CategoryKey::Communication,
    ];

    /// The wire form of this key (kebab-case)
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKey::Spec => "spec",
            CategoryKey::TestbenchRequirements => "testbench-requirements",
            CategoryKey::FunctionalDesign => "functional-design",
            CategoryKey::ArchitectureDesign => "architecture-design",
            CategoryKey::Protocol => "protocol",
            CategoryKey::Uvm => "uvm",
            CategoryKey::FormalVerification => "formal-verification",
            CategoryKey::Assertions => "assertions",
            CategoryKey::Communication => "communication",
        }
    }
}

impl std::fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCategory { key: s.to_string() })
    }
}
