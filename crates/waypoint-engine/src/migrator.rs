//! Batch migrators and the per-item engine they share.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use waypoint_core::{ContentKind, Error, MigrationStatus, Result};

use crate::batch::{BatchResult, ItemResult, MigrationBatch};
use crate::events::{EventEmitter, MigrationEvent};
use crate::item::MigrationItem;
use crate::preparer::ItemPreparer;
use crate::strategy::PublishStrategy;

/// Migrates one batch of items of a single content kind.
#[async_trait]
pub trait BatchMigrator<K: ContentKind>: Send + Sync {
    /// Run every item to a final status.
    ///
    /// Item failures and batch-local cancellation end up in the result.
    /// `Err(Error::Canceled)` means the caller's token fired.
    async fn migrate_batch(
        &self,
        items: Vec<MigrationItem<K>>,
        cancel: &CancellationToken,
    ) -> Result<BatchResult>;
}

/// Per-item execution shared by the sequential and parallel migrators.
///
/// Cheap to clone; every field is shared.
pub(crate) struct BatchEngine<K: ContentKind> {
    preparer: Arc<ItemPreparer<K>>,
    strategy: Arc<dyn PublishStrategy<K>>,
    events: EventEmitter,
}

impl<K: ContentKind> Clone for BatchEngine<K> {
    fn clone(&self) -> Self {
        Self {
            preparer: Arc::clone(&self.preparer),
            strategy: Arc::clone(&self.strategy),
            events: self.events.clone(),
        }
    }
}

impl<K: ContentKind> BatchEngine<K> {
    pub(crate) fn new(
        preparer: Arc<ItemPreparer<K>>,
        strategy: Arc<dyn PublishStrategy<K>>,
    ) -> Self {
        Self {
            preparer,
            strategy,
            events: EventEmitter::default(),
        }
    }

    pub(crate) fn set_events(&mut self, events: EventEmitter) {
        self.events = events;
    }

    pub(crate) fn started(&self, batch: &MigrationBatch<K>) {
        info!(
            content_type = %K::CONTENT_TYPE,
            batch_id = %batch.batch_id(),
            batch_size = batch.len(),
            "Batch started"
        );
        self.events.emit(MigrationEvent::BatchStarted {
            batch_id: batch.batch_id(),
            content_type: K::CONTENT_TYPE,
            size: batch.len(),
        });
    }

    /// Prepare and hand off one item, recording any failure on its entry.
    ///
    /// Returns `Err(Error::Canceled)` when the item observed a cancellation and
    /// the caller's token fired, even if the item also failed for real.
    pub(crate) async fn run_item(
        &self,
        batch: &MigrationBatch<K>,
        item: &MigrationItem<K>,
        caller: &CancellationToken,
    ) -> Result<()> {
        let cancel = batch.cancel_token();
        let outcome = if cancel.is_cancelled() {
            Err(Error::Canceled)
        } else {
            match self.preparer.prepare(item, cancel).await {
                Ok(publish) => self.strategy.migrate_prepared(batch, item, publish).await,
                Err(e) => Err(e),
            }
        };

        let Err(e) = outcome else {
            return Ok(());
        };

        // Cancellation is an outcome, not an item error: only real failures
        // are recorded.
        let (cancellations, failures): (Vec<Error>, Vec<Error>) =
            e.flatten().into_iter().partition(Error::is_cancellation);
        let observed_cancel = !cancellations.is_empty();

        if failures.is_empty() && observed_cancel {
            debug!(
                content_type = %K::CONTENT_TYPE,
                source_id = %item.reference().id,
                "Item canceled"
            );
            item.entry().set_canceled().await;
        } else {
            warn!(
                content_type = %K::CONTENT_TYPE,
                source_id = %item.reference().id,
                source_location = %item.reference().location,
                errors = ?failures,
                "Item migration failed"
            );
            item.entry().set_failed(failures).await;
            if batch.halt_on_failure() && !batch.is_cancelled() {
                info!(
                    batch_id = %batch.batch_id(),
                    "Halting batch after item failure"
                );
                batch.cancel();
            }
        }

        if observed_cancel && caller.is_cancelled() {
            return Err(Error::Canceled);
        }
        Ok(())
    }

    /// Record a panicked item task as failed.
    pub(crate) async fn record_panic(&self, batch: &MigrationBatch<K>, item: &MigrationItem<K>) {
        item.entry()
            .set_failed([Error::Internal("Item task panicked".to_string())])
            .await;
        if batch.halt_on_failure() {
            batch.cancel();
        }
    }

    /// Caller cancellation: stop the batch and close every open entry.
    pub(crate) async fn abort(&self, batch: &MigrationBatch<K>) -> Error {
        batch.cancel();
        // Staged items will never be published.
        let _ = batch.take_staged().await;
        for item in batch.items() {
            if item.entry().status().await == MigrationStatus::Pending {
                item.entry().set_canceled().await;
            }
        }
        info!(
            content_type = %K::CONTENT_TYPE,
            batch_id = %batch.batch_id(),
            "Batch canceled by caller"
        );
        Error::Canceled
    }

    /// Complete the strategy, close leftover entries and build the result.
    pub(crate) async fn finish(
        &self,
        batch: &MigrationBatch<K>,
        caller: &CancellationToken,
        start: Instant,
    ) -> Result<BatchResult> {
        let errors = match self.strategy.complete_batch(batch, caller).await {
            Ok(errors) => errors,
            Err(_) => return Err(self.abort(batch).await),
        };

        let mut item_results = Vec::with_capacity(batch.len());
        for item in batch.items() {
            // An entry the strategy never completed did not finish this attempt.
            if item.entry().status().await == MigrationStatus::Pending {
                item.entry().set_canceled().await;
            }
            let result = ItemResult::from(item.entry().snapshot().await);
            self.events.emit(MigrationEvent::ItemCompleted {
                batch_id: batch.batch_id(),
                content_type: K::CONTENT_TYPE,
                source_id: result.source.id,
                status: result.status,
            });
            item_results.push(result);
        }

        let result = BatchResult {
            batch_id: batch.batch_id(),
            perform_next_batch: !caller.is_cancelled() && !misconfigured(&item_results),
            item_results,
            errors,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let migrated = result.count(MigrationStatus::Migrated);
        let failed = result.count(MigrationStatus::Error);
        let canceled = result.count(MigrationStatus::Canceled);
        info!(
            content_type = %K::CONTENT_TYPE,
            batch_id = %batch.batch_id(),
            batch_size = batch.len(),
            migrated,
            failed,
            canceled,
            duration_ms,
            "Batch completed"
        );
        self.events.emit(MigrationEvent::BatchCompleted {
            batch_id: batch.batch_id(),
            content_type: K::CONTENT_TYPE,
            migrated,
            failed,
            canceled,
            duration_ms,
        });

        Ok(result)
    }
}

/// Every item failed, and only with configuration errors: later batches
/// would fail the same way.
fn misconfigured(results: &[ItemResult]) -> bool {
    !results.is_empty()
        && results.iter().all(|r| {
            r.status == MigrationStatus::Error
                && !r.errors.is_empty()
                && r.errors.iter().all(|e| matches!(e, Error::Config(_)))
        })
}

// =============================================================================
// SEQUENTIAL
// =============================================================================

/// Migrates the items of a batch one after another, in input order.
pub struct SequentialBatchMigrator<K: ContentKind> {
    engine: BatchEngine<K>,
    halt_on_failure: bool,
}

impl<K: ContentKind> SequentialBatchMigrator<K> {
    pub fn new(preparer: Arc<ItemPreparer<K>>, strategy: Arc<dyn PublishStrategy<K>>) -> Self {
        Self {
            engine: BatchEngine::new(preparer, strategy),
            halt_on_failure: false,
        }
    }

    /// Cancel the rest of a batch at its first failed item.
    pub fn with_halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    /// Broadcast progress events on `tx`.
    pub fn with_events(mut self, tx: tokio::sync::broadcast::Sender<MigrationEvent>) -> Self {
        self.engine.set_events(EventEmitter::new(tx));
        self
    }
}

#[async_trait]
impl<K: ContentKind> BatchMigrator<K> for SequentialBatchMigrator<K> {
    #[instrument(
        skip(self, items, cancel),
        fields(
            subsystem = "engine",
            component = "sequential",
            op = "migrate_batch",
            content_type = %K::CONTENT_TYPE,
            batch_size = items.len(),
        )
    )]
    async fn migrate_batch(
        &self,
        items: Vec<MigrationItem<K>>,
        cancel: &CancellationToken,
    ) -> Result<BatchResult> {
        let start = Instant::now();
        let batch = MigrationBatch::new(items, cancel).with_halt_on_failure(self.halt_on_failure);
        self.engine.started(&batch);

        for item in batch.items() {
            if self.engine.run_item(&batch, item, cancel).await.is_err() {
                return Err(self.engine.abort(&batch).await);
            }
        }

        self.engine.finish(&batch, cancel, start).await
    }
}
