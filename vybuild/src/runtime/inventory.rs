//! Existing image inventory.

use super::{ContainerRuntime, ImageEntry};
use crate::errors::RuntimeError;
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::debug;

/// Lists images matching `filters`, most recently created first.
///
/// Entries without a creation time sort last, in runtime order.
///
/// # Errors
///
/// Propagates the runtime's listing failure.
pub async fn existing_tags(
    runtime: &dyn ContainerRuntime,
    filters: &[String],
) -> Result<Vec<ImageEntry>, RuntimeError> {
    let mut entries = runtime.list_images(filters).await?;
    entries.sort_by_key(|entry| Reverse(entry.created_at));
    Ok(entries)
}

/// A snapshot of the tags the runtime already has.
///
/// Loaded at most once per build run; the orchestrator tracks images it
/// builds itself separately.
#[derive(Debug, Clone, Default)]
pub struct ImageInventory {
    entries: Vec<ImageEntry>,
    references: HashSet<String>,
}

impl ImageInventory {
    /// Queries `runtime` for images matching `filters`.
    ///
    /// # Errors
    ///
    /// Propagates the runtime's listing failure.
    pub async fn load(
        runtime: &dyn ContainerRuntime,
        filters: &[String],
    ) -> Result<Self, RuntimeError> {
        let entries = existing_tags(runtime, filters).await?;
        debug!(count = entries.len(), "Loaded image inventory");
        Ok(Self::from_entries(entries))
    }

    /// Builds an inventory from already listed entries, ignoring untagged ones.
    #[must_use]
    pub fn from_entries(entries: Vec<ImageEntry>) -> Self {
        let entries: Vec<ImageEntry> = entries.into_iter().filter(|e| !e.is_dangling()).collect();
        let references = entries.iter().map(ImageEntry::reference).collect();
        Self {
            entries,
            references,
        }
    }

    /// Returns true if an image tagged `tag` exists.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.references.contains(tag)
    }

    /// The listed entries, most recent first.
    #[must_use]
    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }
}
