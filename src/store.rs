//! Persistence seam for the current upload package
//!
//! There is exactly one "current" package at a time. The store contract is
//! deliberately small (`load`/`save`/`clear`) so views and tests can
//! substitute an in-memory implementation for the JSON file document used
//! in production.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::package::UploadPackage;

/// Storage backend for the single current [`UploadPackage`]
///
/// `save` replaces any prior snapshot wholesale; partial updates do not
/// exist in this contract.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Load the current package, if one is present and readable
    ///
    /// A corrupted or unparseable snapshot loads as `Ok(None)`; consumers
    /// must never crash on state persisted by an older or broken client.
    async fn load(&self) -> Result<Option<UploadPackage>>;

    /// Replace the persisted package with `package`
    async fn save(&self, package: &UploadPackage) -> Result<()>;

    /// Remove the persisted package, if any
    async fn clear(&self) -> Result<()>;
}

/// File-backed store holding the package as one JSON document
///
/// The document is overwritten wholesale on every save, via a
/// write-to-temp-then-rename so readers never observe a half-written file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the JSON document at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PackageStore for JsonFileStore {
    async fn load(&self) -> Result<Option<UploadPackage>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(package) => Ok(Some(package)),
            Err(e) => {
                // Fail closed: malformed state is treated as "no package
                // present" rather than propagated to the consuming view.
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "discarding malformed persisted package"
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, package: &UploadPackage) -> Result<()> {
        let json = serde_json::to_vec_pretty(package)?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        tracing::debug!(path = %self.path.display(), "persisted upload package");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and embedded use
#[derive(Default)]
pub struct MemoryStore {
    current: Mutex<Option<UploadPackage>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageStore for MemoryStore {
    async fn load(&self) -> Result<Option<UploadPackage>> {
        Ok(self.current.lock().await.clone())
    }

    async fn save(&self, package: &UploadPackage) -> Result<()> {
        *self.current.lock().await = Some(package.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.current.lock().await = None;
        Ok(())
    }
}
