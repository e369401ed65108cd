//! Ephemeral artifact handles for viewing and downloading uploaded files
//!
//! Views repeatedly ask for a dereferenceable handle to the same logical
//! file on every re-render. The resolver caches handles per content digest
//! so that repeated [`resolve`](ArtifactResolver::resolve) calls do not grow
//! the live-handle set, and requires every handle to be revoked by whichever
//! component last displays it. Revocation is idempotent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::FileRef;

/// Dereferenceable handle to one uploaded file's bytes
///
/// Obtained from [`ArtifactResolver::resolve`]; valid until revoked.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactHandle {
    key: String,
    uri: String,
    name: String,
}

impl ArtifactHandle {
    /// Opaque locator a view can hand to its display/download mechanism
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Display name of the underlying file
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Creates and revokes [`ArtifactHandle`]s, deduplicated by file content
#[derive(Default)]
pub struct ArtifactResolver {
    entries: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl ArtifactResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Arc<[u8]>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or reuse) a handle for `file`
    ///
    /// Deterministic per file content: resolving the same bytes twice yields
    /// a handle to the same underlying entry rather than a new resource.
    pub fn resolve(&self, file: &FileRef) -> ArtifactHandle {
        let digest = file.digest();
        self.lock_entries()
            .entry(digest.clone())
            .or_insert_with(|| Arc::clone(file.payload()));
        ArtifactHandle {
            uri: format!("artifact://{digest}"),
            name: file.name().to_string(),
            key: digest,
        }
    }

    /// Dereference a live handle to its bytes
    ///
    /// Returns `None` once the handle has been revoked.
    pub fn open(&self, handle: &ArtifactHandle) -> Option<Arc<[u8]>> {
        self.lock_entries().get(&handle.key).cloned()
    }

    /// Release the resource behind `handle`
    ///
    /// Idempotent: revoking an already-revoked or unknown handle is a no-op.
    pub fn revoke(&self, handle: &ArtifactHandle) {
        if self.lock_entries().remove(&handle.key).is_some() {
            tracing::debug!(uri = %handle.uri, "artifact handle revoked");
        }
    }

    /// Number of live (unrevoked) entries
    pub fn live_entries(&self) -> usize {
        self.lock_entries().len()
    }
}
