//! Migration items: a source snapshot paired with its manifest entry.

use std::sync::Arc;

use waypoint_core::{ContentKind, ContentReference, ManifestEntryHandle, SourceItem};

/// One source item and the manifest entry recording its outcome.
///
/// Lives for exactly one migration attempt.
pub struct MigrationItem<K: ContentKind> {
    source: Arc<K::Source>,
    entry: ManifestEntryHandle,
}

impl<K: ContentKind> MigrationItem<K> {
    pub fn new(source: impl Into<Arc<K::Source>>, entry: ManifestEntryHandle) -> Self {
        Self {
            source: source.into(),
            entry,
        }
    }

    /// Immutable source snapshot.
    pub fn source(&self) -> &K::Source {
        &self.source
    }

    /// Shared handle to the source snapshot.
    pub fn source_arc(&self) -> Arc<K::Source> {
        Arc::clone(&self.source)
    }

    /// Source reference.
    pub fn reference(&self) -> &ContentReference {
        self.source.reference()
    }

    /// Manifest entry editor.
    pub fn entry(&self) -> &ManifestEntryHandle {
        &self.entry
    }
}

// Manual impl: the derive would require `K: Clone`.
impl<K: ContentKind> Clone for MigrationItem<K> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            entry: self.entry.clone(),
        }
    }
}

impl<K: ContentKind> std::fmt::Debug for MigrationItem<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationItem")
            .field("content_type", &K::CONTENT_TYPE)
            .field("source", self.reference())
            .finish()
    }
}
