//! Per-content-type driver: filters, maps and batches a source listing.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use waypoint_core::{
    defaults, ContentFilter, ContentKind, ContentType, Error, IdentityMapper, LocationMapper,
    MigrationManifest, MigrationStatus, Result, SourceItem,
};

use crate::batch::ItemResult;
use crate::config::EngineConfig;
use crate::item::MigrationItem;
use crate::migrator::BatchMigrator;

/// Outcome of migrating one content type.
#[derive(Debug, Clone, Serialize)]
pub struct ContentMigrationResult {
    pub content_type: ContentType,
    /// One result per listed item, skipped items included.
    pub item_results: Vec<ItemResult>,
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<Error>,
    /// A batch asked for no further batches to be scheduled.
    pub stopped_early: bool,
}

impl ContentMigrationResult {
    pub fn count(&self, status: MigrationStatus) -> usize {
        self.item_results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }
}

fn serialize_errors<S: serde::Serializer>(
    errors: &[Error],
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.collect_seq(errors.iter().map(ToString::to_string))
}

/// Migrates every listed item of one content kind, batch by batch.
pub struct ContentMigrator<K: ContentKind> {
    manifest: MigrationManifest,
    migrator: Arc<dyn BatchMigrator<K>>,
    mapper: Arc<dyn LocationMapper>,
    filters: Vec<Arc<dyn ContentFilter<K>>>,
    batch_size: usize,
}

impl<K: ContentKind> ContentMigrator<K> {
    pub fn new(manifest: MigrationManifest, migrator: Arc<dyn BatchMigrator<K>>) -> Self {
        Self {
            manifest,
            migrator,
            mapper: Arc::new(IdentityMapper),
            filters: Vec::new(),
            batch_size: defaults::BATCH_SIZE,
        }
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn LocationMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// Add a filter. An item is migrated only if every filter includes it.
    pub fn with_filter(mut self, filter: Arc<dyn ContentFilter<K>>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Items per batch; zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Take the batch size from the engine configuration.
    pub fn with_config(self, config: &EngineConfig) -> Self {
        self.with_batch_size(config.batch_size)
    }

    /// Migrate `sources`.
    ///
    /// Returns `Err(Error::Canceled)` when `cancel` fires; items not yet
    /// handed to a batch are marked canceled first.
    #[instrument(
        skip(self, sources, cancel),
        fields(
            subsystem = "engine",
            component = "driver",
            op = "migrate",
            content_type = %K::CONTENT_TYPE,
            item_count = sources.len(),
        )
    )]
    pub async fn migrate(
        &self,
        sources: Vec<K::Source>,
        cancel: &CancellationToken,
    ) -> Result<ContentMigrationResult> {
        let mut item_results = Vec::with_capacity(sources.len());
        let mut queued = Vec::with_capacity(sources.len());

        for source in sources {
            let reference = source.reference().clone();
            let mapped = self.mapper.map(K::CONTENT_TYPE, &reference);
            let entry = self
                .manifest
                .entry_for(K::CONTENT_TYPE, &reference, mapped)
                .await;

            if entry.status().await.is_terminal() {
                debug!(source_id = %reference.id, "Item already completed in this run");
                item_results.push(ItemResult::from(entry.snapshot().await));
                continue;
            }
            if !self.filters.iter().all(|f| f.include(&source)) {
                debug!(source_id = %reference.id, "Item excluded by filter");
                entry.set_skipped().await;
                item_results.push(ItemResult::from(entry.snapshot().await));
                continue;
            }
            queued.push(MigrationItem::<K>::new(Arc::new(source), entry));
        }

        info!(
            queued = queued.len(),
            skipped = item_results.len(),
            batch_size = self.batch_size,
            "Migrating content type"
        );

        let mut errors = Vec::new();
        let mut stopped_early = false;
        let mut remaining = queued.into_iter().peekable();

        while remaining.peek().is_some() {
            if cancel.is_cancelled() {
                cancel_all(remaining).await;
                return Err(Error::Canceled);
            }
            if stopped_early {
                // Close out unscheduled items so the manifest has no pending entries.
                for item in remaining.by_ref() {
                    item.entry().set_canceled().await;
                    item_results.push(ItemResult::from(item.entry().snapshot().await));
                }
                break;
            }

            let batch: Vec<MigrationItem<K>> = remaining.by_ref().take(self.batch_size).collect();
            let result = match self.migrator.migrate_batch(batch, cancel).await {
                Ok(result) => result,
                Err(e) => {
                    self.manifest.record_error(&e).await;
                    cancel_all(remaining).await;
                    return Err(e);
                }
            };

            for error in &result.errors {
                self.manifest.record_error(error).await;
            }
            errors.extend(result.errors);
            item_results.extend(result.item_results);
            if !result.perform_next_batch {
                info!("Batch requested no further batches");
                stopped_early = true;
            }
        }

        Ok(ContentMigrationResult {
            content_type: K::CONTENT_TYPE,
            item_results,
            errors,
            stopped_early,
        })
    }
}

async fn cancel_all<K: ContentKind>(items: impl Iterator<Item = MigrationItem<K>>) {
    for item in items {
        item.entry().set_canceled().await;
    }
}
