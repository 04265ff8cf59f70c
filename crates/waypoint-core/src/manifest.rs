//! Per-item migration records and the in-memory manifest that owns them.
//!
//! A [`ManifestEntry`] is the durable record of what happened to one source
//! item. Status only moves forward: `Pending` to exactly one terminal state.
//! The engine never touches an entry directly; it goes through a
//! [`ManifestEntryHandle`], which is lent to one migration item at a time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::content::{ContentLocation, ContentReference, ContentType};
use crate::error::Error;

/// Migration outcome of a single item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    #[default]
    Pending,
    Migrated,
    Skipped,
    Error,
    Canceled,
}

impl MigrationStatus {
    /// Every state except `Pending` is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MigrationStatus::Pending)
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::Migrated => "migrated",
            MigrationStatus::Skipped => "skipped",
            MigrationStatus::Error => "error",
            MigrationStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Migration record for one source item.
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    source: ContentReference,
    destination: Option<ContentReference>,
    mapped_location: ContentLocation,
    status: MigrationStatus,
    errors: Vec<Error>,
    updated_at: DateTime<Utc>,
    destination_confirmed: bool,
}

impl ManifestEntry {
    /// Create a pending entry. The mapped location is the destination-bound
    /// path, usually the output of a location mapper.
    pub fn new(source: ContentReference, mapped_location: ContentLocation) -> Self {
        Self {
            source,
            destination: None,
            mapped_location,
            status: MigrationStatus::Pending,
            errors: Vec::new(),
            updated_at: Utc::now(),
            destination_confirmed: false,
        }
    }

    /// Create a pending entry whose mapped location is the source location.
    pub fn unmapped(source: ContentReference) -> Self {
        let mapped = source.location.clone();
        Self::new(source, mapped)
    }

    pub fn source(&self) -> &ContentReference {
        &self.source
    }

    pub fn destination(&self) -> Option<&ContentReference> {
        self.destination.as_ref()
    }

    pub fn mapped_location(&self) -> &ContentLocation {
        &self.mapped_location
    }

    pub fn status(&self) -> MigrationStatus {
        self.status
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Mark the item migrated.
    pub fn set_migrated(&mut self) -> bool {
        self.transition(MigrationStatus::Migrated)
    }

    /// Mark the item excluded from migration.
    pub fn set_skipped(&mut self) -> bool {
        self.transition(MigrationStatus::Skipped)
    }

    /// Mark the item canceled.
    pub fn set_canceled(&mut self) -> bool {
        self.transition(MigrationStatus::Canceled)
    }

    /// Mark the item failed and record `errors`. Aggregates are flattened.
    ///
    /// On an entry that already failed the errors are appended.
    pub fn set_failed(&mut self, errors: impl IntoIterator<Item = Error>) -> bool {
        if self.status != MigrationStatus::Error && !self.transition(MigrationStatus::Error) {
            return false;
        }
        self.errors
            .extend(errors.into_iter().flat_map(Error::flatten));
        self.updated_at = Utc::now();
        true
    }

    /// Record the destination reference. Accepted once per attempt, and only
    /// while the entry is still pending.
    pub fn destination_found(&mut self, reference: ContentReference) -> bool {
        if self.status.is_terminal() || self.destination_confirmed {
            warn!(
                source_id = %self.source.id,
                status = %self.status,
                destination_id = %reference.id,
                "Ignoring destination for entry that already has one or is terminal"
            );
            return false;
        }
        self.destination = Some(reference);
        self.destination_confirmed = true;
        self.updated_at = Utc::now();
        true
    }

    /// Replace the mapped location while the entry is pending.
    pub fn set_mapped_location(&mut self, mapped_location: ContentLocation) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.mapped_location = mapped_location;
        true
    }

    /// Start a fresh attempt from this record: pending, no errors, previous
    /// destination and mapped location carried forward.
    pub fn next_attempt(&self) -> ManifestEntry {
        Self {
            source: self.source.clone(),
            destination: self.destination.clone(),
            mapped_location: self.mapped_location.clone(),
            status: MigrationStatus::Pending,
            errors: Vec::new(),
            updated_at: Utc::now(),
            destination_confirmed: false,
        }
    }

    fn transition(&mut self, next: MigrationStatus) -> bool {
        if self.status.is_terminal() {
            if self.status != next {
                warn!(
                    source_id = %self.source.id,
                    from = %self.status,
                    to = %next,
                    "Rejected status change on terminal manifest entry"
                );
            }
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }
}

/// Shared, cloneable editor for one manifest entry.
///
/// The manifest keeps one clone; the migration item working on the entry
/// holds another.
#[derive(Debug, Clone)]
pub struct ManifestEntryHandle {
    inner: Arc<RwLock<ManifestEntry>>,
}

impl ManifestEntryHandle {
    pub fn new(entry: ManifestEntry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(entry)),
        }
    }

    /// Owned copy of the current record.
    pub async fn snapshot(&self) -> ManifestEntry {
        self.inner.read().await.clone()
    }

    pub async fn status(&self) -> MigrationStatus {
        self.inner.read().await.status()
    }

    pub async fn mapped_location(&self) -> ContentLocation {
        self.inner.read().await.mapped_location().clone()
    }

    pub async fn set_migrated(&self) -> bool {
        self.inner.write().await.set_migrated()
    }

    pub async fn set_skipped(&self) -> bool {
        self.inner.write().await.set_skipped()
    }

    pub async fn set_canceled(&self) -> bool {
        self.inner.write().await.set_canceled()
    }

    pub async fn set_failed(&self, errors: impl IntoIterator<Item = Error>) -> bool {
        let errors: Vec<Error> = errors.into_iter().collect();
        self.inner.write().await.set_failed(errors)
    }

    pub async fn destination_found(&self, reference: ContentReference) -> bool {
        self.inner.write().await.destination_found(reference)
    }

    pub async fn set_mapped_location(&self, mapped_location: ContentLocation) -> bool {
        self.inner.write().await.set_mapped_location(mapped_location)
    }

    /// True if both handles edit the same entry.
    pub fn same_entry(&self, other: &ManifestEntryHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Serializable audit record of one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub content_type: ContentType,
    pub source: ContentReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<ContentReference>,
    pub mapped_location: ContentLocation,
    pub status: MigrationStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Serializable audit record of a whole manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSnapshot {
    pub manifest_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub entries: Vec<EntryRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Count of entries per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManifestSummary {
    pub pending: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub error: usize,
    pub canceled: usize,
}

impl ManifestSummary {
    fn record(&mut self, status: MigrationStatus) {
        match status {
            MigrationStatus::Pending => self.pending += 1,
            MigrationStatus::Migrated => self.migrated += 1,
            MigrationStatus::Skipped => self.skipped += 1,
            MigrationStatus::Error => self.error += 1,
            MigrationStatus::Canceled => self.canceled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.migrated + self.skipped + self.error + self.canceled
    }
}

type EntryKey = (ContentType, Uuid);

#[derive(Default)]
struct ManifestState {
    order: Vec<(EntryKey, ManifestEntryHandle)>,
    index: HashMap<EntryKey, usize>,
    errors: Vec<String>,
}

/// In-memory manifest: every entry of one migration run, keyed by content
/// type and source id, in first-seen order.
#[derive(Clone)]
pub struct MigrationManifest {
    manifest_id: Uuid,
    started_at: DateTime<Utc>,
    state: Arc<RwLock<ManifestState>>,
}

impl Default for MigrationManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationManifest {
    pub fn new() -> Self {
        Self {
            manifest_id: Uuid::now_v7(),
            started_at: Utc::now(),
            state: Arc::new(RwLock::new(ManifestState::default())),
        }
    }

    /// Start a new run from a previous run's record. Every previous entry
    /// becomes a fresh pending entry with its destination and mapped location
    /// carried forward; the previous run's terminal states stay in its own
    /// snapshot.
    pub async fn resume_from(previous: &ManifestSnapshot) -> Self {
        let manifest = Self::new();
        {
            let mut state = manifest.state.write().await;
            for record in &previous.entries {
                let mut entry =
                    ManifestEntry::new(record.source.clone(), record.mapped_location.clone());
                entry.destination = record.destination.clone();
                let key = (record.content_type, record.source.id);
                if state.index.contains_key(&key) {
                    continue;
                }
                let position = state.order.len();
                state.order.push((key, ManifestEntryHandle::new(entry)));
                state.index.insert(key, position);
            }
        }
        manifest
    }

    pub fn manifest_id(&self) -> Uuid {
        self.manifest_id
    }

    /// Get or create the entry for a source item.
    ///
    /// An existing pending entry has its mapped location refreshed; terminal
    /// entries are returned untouched.
    pub async fn entry_for(
        &self,
        content_type: ContentType,
        source: &ContentReference,
        mapped_location: ContentLocation,
    ) -> ManifestEntryHandle {
        let key = (content_type, source.id);
        let mut state = self.state.write().await;
        if let Some(&position) = state.index.get(&key) {
            let handle = state.order[position].1.clone();
            drop(state);
            handle.set_mapped_location(mapped_location).await;
            return handle;
        }
        let handle = ManifestEntryHandle::new(ManifestEntry::new(source.clone(), mapped_location));
        let position = state.order.len();
        state.order.push((key, handle.clone()));
        state.index.insert(key, position);
        handle
    }

    /// Entries of one content type, in first-seen order.
    pub async fn entries(&self, content_type: ContentType) -> Vec<ManifestEntryHandle> {
        self.state
            .read()
            .await
            .order
            .iter()
            .filter(|((ty, _), _)| *ty == content_type)
            .map(|(_, handle)| handle.clone())
            .collect()
    }

    /// Record a manifest-level error (one not attributable to a single item).
    pub async fn record_error(&self, error: &Error) {
        self.state.write().await.errors.push(error.to_string());
    }

    /// Count entries per status.
    pub async fn summary(&self) -> ManifestSummary {
        let handles: Vec<ManifestEntryHandle> = {
            let state = self.state.read().await;
            state.order.iter().map(|(_, h)| h.clone()).collect()
        };
        let mut summary = ManifestSummary::default();
        for handle in handles {
            summary.record(handle.status().await);
        }
        summary
    }

    /// Serializable copy of the whole manifest.
    pub async fn snapshot(&self) -> ManifestSnapshot {
        let (keyed, errors) = {
            let state = self.state.read().await;
            let keyed: Vec<(ContentType, ManifestEntryHandle)> = state
                .order
                .iter()
                .map(|((ty, _), h)| (*ty, h.clone()))
                .collect();
            (keyed, state.errors.clone())
        };

        let mut entries = Vec::with_capacity(keyed.len());
        for (content_type, handle) in keyed {
            let entry = handle.snapshot().await;
            entries.push(EntryRecord {
                content_type,
                source: entry.source.clone(),
                destination: entry.destination.clone(),
                mapped_location: entry.mapped_location.clone(),
                status: entry.status,
                errors: entry.errors.iter().map(ToString::to_string).collect(),
                updated_at: entry.updated_at,
            });
        }

        ManifestSnapshot {
            manifest_id: self.manifest_id,
            started_at: self.started_at,
            entries,
            errors,
        }
    }
}
