//! Hierarchical upload aggregation
//!
//! A design submission is a tree: one top module, an ordered list of named
//! sub-modules, and per-module categorized file sets. The
//! [`UploadTreeBuilder`] accumulates that tree while the user interacts with
//! the form; [`UploadTreeBuilder::build`] validates it, freezes it into an
//! [`UploadPackage`], and replaces the persisted snapshot wholesale.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result, ValidationError};
use crate::store::PackageStore;
use crate::types::{CategoryKey, FileRef};

/// Finalized, immutable snapshot of a design upload tree
///
/// Invariant: every key in `uploads` names either `top_module` or an entry
/// in `sub_modules`; `sub_modules` contains no duplicates and no empty
/// strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadPackage {
    /// Name of the top-level module
    pub top_module: String,
    /// Ordered sub-module names, unique and non-empty
    pub sub_modules: Vec<String>,
    /// Categorized file sets per module name
    pub uploads: HashMap<String, HashMap<CategoryKey, Vec<FileRef>>>,
}

impl UploadPackage {
    /// Files recorded for a module/category pair, if any
    pub fn files(&self, module: &str, category: CategoryKey) -> Option<&[FileRef]> {
        self.uploads
            .get(module)
            .and_then(|categories| categories.get(&category))
            .map(Vec::as_slice)
    }
}

/// Incrementally assembles and validates a design upload tree
///
/// The builder always holds at least one sub-module slot. Uploads are keyed
/// by the module name captured at upload time, not by slot index: renaming a
/// slot does not migrate its uploads, and shrinking the slot list leaves
/// previously recorded uploads in place (they are recoverable if the list
/// grows back, and filtered out of any package built while orphaned).
pub struct UploadTreeBuilder {
    top_module: String,
    sub_modules: Vec<String>,
    uploads: HashMap<String, HashMap<CategoryKey, Vec<FileRef>>>,
    store: Arc<dyn PackageStore>,
}

impl UploadTreeBuilder {
    /// Create an empty builder persisting through `store`
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self {
            top_module: String::new(),
            sub_modules: vec![String::new()],
            uploads: HashMap::new(),
            store,
        }
    }

    /// Set the top module name (stored trimmed)
    ///
    /// An empty name after trimming is a pending validation error reported
    /// by [`build`](Self::build), not an immediate failure.
    pub fn set_top_module(&mut self, name: &str) {
        self.top_module = name.trim().to_string();
    }

    /// Resize the sub-module list to `max(1, count)` slots
    ///
    /// Existing entries are preserved by index; growth appends empty slots,
    /// shrinking truncates from the tail.
    pub fn set_sub_module_count(&mut self, count: usize) {
        let count = count.max(1);
        self.sub_modules.resize(count, String::new());
        tracing::debug!(count, "sub-module list resized");
    }

    /// Rename the sub-module slot at `index` (stored trimmed)
    ///
    /// Uploads recorded under the previous name stay keyed by that name.
    pub fn rename_sub_module(&mut self, index: usize, name: &str) {
        match self.sub_modules.get_mut(index) {
            Some(slot) => *slot = name.trim().to_string(),
            None => {
                tracing::warn!(index, "rename ignored: no sub-module slot at index");
            }
        }
    }

    /// Current top module name
    pub fn top_module(&self) -> &str {
        &self.top_module
    }

    /// Current sub-module names, in order
    pub fn sub_modules(&self) -> &[String] {
        &self.sub_modules
    }

    /// Replace the file list recorded for a module/category pair
    ///
    /// Replacement, not merge: the previous list for that pair is dropped.
    pub fn record_upload(&mut self, module: &str, category: CategoryKey, files: Vec<FileRef>) {
        tracing::debug!(
            module,
            category = %category,
            file_count = files.len(),
            "recorded upload set"
        );
        self.uploads
            .entry(module.to_string())
            .or_default()
            .insert(category, files);
    }

    /// Validate the tree and finalize it into an [`UploadPackage`]
    ///
    /// On success the persisted current package is replaced wholesale. On
    /// validation failure every violated constraint is reported and neither
    /// the builder nor the persisted snapshot changes.
    pub async fn build(&self) -> Result<UploadPackage> {
        let mut errors = Vec::new();

        if self.top_module.is_empty() {
            errors.push(ValidationError::EmptyTopModule);
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for (index, name) in self.sub_modules.iter().enumerate() {
            if name.is_empty() {
                errors.push(ValidationError::EmptySubModule { index });
            } else if !seen.insert(name.as_str()) {
                errors.push(ValidationError::DuplicateSubModule { name: name.clone() });
            }
        }

        if !errors.is_empty() {
            return Err(Error::Validation { errors });
        }

        // Drop orphaned upload entries (recorded under names no longer in
        // the tree) so the package invariant holds; the builder keeps them.
        let mut tree_names: HashSet<&str> = HashSet::new();
        tree_names.insert(self.top_module.as_str());
        tree_names.extend(self.sub_modules.iter().map(String::as_str));

        let uploads = self
            .uploads
            .iter()
            .filter(|(module, _)| tree_names.contains(module.as_str()))
            .map(|(module, categories)| (module.clone(), categories.clone()))
            .collect();

        let package = UploadPackage {
            top_module: self.top_module.clone(),
            sub_modules: self.sub_modules.clone(),
            uploads,
        };

        self.store.save(&package).await?;
        tracing::debug!(
            top_module = %package.top_module,
            sub_modules = package.sub_modules.len(),
            "upload package finalized"
        );
        Ok(package)
    }
}
