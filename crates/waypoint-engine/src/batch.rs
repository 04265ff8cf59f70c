//! Batch state shared by migrators and publish strategies, and batch results.

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use waypoint_core::{
    ContentKind, ContentLocation, ContentReference, Error, ManifestEntry, MigrationStatus,
};

use crate::item::MigrationItem;

/// One batch of items migrated together.
///
/// Owns a batch-local cancellation token derived from the caller's token:
/// cancelling the batch stops siblings without cancelling the migration.
pub struct MigrationBatch<K: ContentKind> {
    batch_id: Uuid,
    items: Vec<MigrationItem<K>>,
    cancel: CancellationToken,
    halt_on_failure: bool,
    staged: Mutex<Vec<(MigrationItem<K>, K::Publish)>>,
}

impl<K: ContentKind> MigrationBatch<K> {
    pub fn new(items: Vec<MigrationItem<K>>, caller: &CancellationToken) -> Self {
        Self {
            batch_id: Uuid::now_v7(),
            items,
            cancel: caller.child_token(),
            halt_on_failure: false,
            staged: Mutex::new(Vec::new()),
        }
    }

    /// Cancel the rest of the batch when any item fails.
    pub fn with_halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn items(&self) -> &[MigrationItem<K>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn halt_on_failure(&self) -> bool {
        self.halt_on_failure
    }

    /// Batch-local token observed by every stage of every item.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop the remaining items of this batch only.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Hold a prepared item until the batch completes.
    pub async fn stage(&self, item: MigrationItem<K>, publish: K::Publish) {
        self.staged.lock().await.push((item, publish));
    }

    /// Take every staged item, leaving none behind.
    pub async fn take_staged(&self) -> Vec<(MigrationItem<K>, K::Publish)> {
        std::mem::take(&mut *self.staged.lock().await)
    }
}

/// Final state of one item after a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemResult {
    pub source: ContentReference,
    pub destination: Option<ContentReference>,
    pub mapped_location: ContentLocation,
    pub status: MigrationStatus,
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<Error>,
}

impl From<ManifestEntry> for ItemResult {
    fn from(entry: ManifestEntry) -> Self {
        Self {
            source: entry.source().clone(),
            destination: entry.destination().cloned(),
            mapped_location: entry.mapped_location().clone(),
            status: entry.status(),
            errors: entry.errors().to_vec(),
        }
    }
}

fn serialize_errors<S: serde::Serializer>(errors: &[Error], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(errors.iter().map(ToString::to_string))
}

/// Outcome of one batch call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    /// One result per input item, in input order.
    pub item_results: Vec<ItemResult>,
    /// Failures not attributable to a single item.
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<Error>,
    /// False when the caller should stop scheduling batches.
    pub perform_next_batch: bool,
}

impl BatchResult {
    pub fn count(&self, status: MigrationStatus) -> usize {
        self.item_results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }
}
