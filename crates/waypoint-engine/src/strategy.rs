//! Publish strategies: how prepared items reach the destination.
//!
//! [`ItemPublishStrategy`] publishes each item as soon as it is prepared.
//! [`BulkPublishStrategy`] holds prepared items until the batch completes and
//! sends them in one call.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use waypoint_core::{
    ContentKind, DestinationEndpoint, DestinationFinder, Error, PublishedItem, Result,
};

use crate::batch::MigrationBatch;
use crate::item::MigrationItem;

/// Runs after a single item was published, before its destination is
/// recorded and it is marked migrated.
#[async_trait]
pub trait PostPublishHook<K: ContentKind>: Send + Sync {
    fn name(&self) -> &str;

    async fn after_publish(
        &self,
        item: &MigrationItem<K>,
        published: &K::Published,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Runs once after a bulk publish call succeeded.
#[async_trait]
pub trait BatchPostPublishHook<K: ContentKind>: Send + Sync {
    fn name(&self) -> &str;

    async fn after_publish_batch(
        &self,
        items: &[MigrationItem<K>],
        published: &[K::Publish],
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Moves prepared items to the destination.
#[async_trait]
pub trait PublishStrategy<K: ContentKind>: Send + Sync {
    /// Take over a prepared item.
    ///
    /// An error is recorded on the item by the caller; the strategy only
    /// records successful outcomes itself.
    async fn migrate_prepared(
        &self,
        batch: &MigrationBatch<K>,
        item: &MigrationItem<K>,
        publish: K::Publish,
    ) -> Result<()>;

    /// Called once after every item of the batch was handled.
    ///
    /// Returns batch-level errors. `Err` is reserved for cancellation by the
    /// caller.
    async fn complete_batch(
        &self,
        _batch: &MigrationBatch<K>,
        _caller: &CancellationToken,
    ) -> Result<Vec<Error>> {
        Ok(Vec::new())
    }
}

// =============================================================================
// ITEM PUBLISH
// =============================================================================

/// Publishes each item individually.
pub struct ItemPublishStrategy<K: ContentKind> {
    destination: Arc<dyn DestinationEndpoint<K>>,
    hooks: Vec<Arc<dyn PostPublishHook<K>>>,
}

impl<K: ContentKind> ItemPublishStrategy<K> {
    pub fn new(destination: Arc<dyn DestinationEndpoint<K>>) -> Self {
        Self {
            destination,
            hooks: Vec::new(),
        }
    }

    /// Append a post-publish hook. Hooks run in the order they were added.
    pub fn with_hook(mut self, hook: Arc<dyn PostPublishHook<K>>) -> Self {
        self.hooks.push(hook);
        self
    }
}

#[async_trait]
impl<K: ContentKind> PublishStrategy<K> for ItemPublishStrategy<K> {
    async fn migrate_prepared(
        &self,
        batch: &MigrationBatch<K>,
        item: &MigrationItem<K>,
        publish: K::Publish,
    ) -> Result<()> {
        let cancel = batch.cancel_token();
        if cancel.is_cancelled() {
            return Err(Error::Canceled);
        }

        let published = self.destination.publish(&publish, cancel).await?;
        let destination = published.destination_reference();
        debug!(
            content_type = %K::CONTENT_TYPE,
            source_id = %item.reference().id,
            destination_id = %destination.id,
            "Item published"
        );
        for hook in &self.hooks {
            if let Err(e) = hook.after_publish(item, &published, cancel).await {
                warn!(
                    hook = hook.name(),
                    source_id = %item.reference().id,
                    error = %e,
                    "Post-publish hook failed"
                );
                return Err(e);
            }
        }

        // Only a fully successful publish records the destination.
        item.entry().destination_found(destination).await;
        item.entry().set_migrated().await;
        Ok(())
    }
}

// =============================================================================
// BULK PUBLISH
// =============================================================================

/// Publishes a whole batch in one destination call.
pub struct BulkPublishStrategy<K: ContentKind> {
    destination: Arc<dyn DestinationEndpoint<K>>,
    hooks: Vec<Arc<dyn BatchPostPublishHook<K>>>,
    destination_lookup: Option<Arc<dyn DestinationFinder>>,
}

impl<K: ContentKind> BulkPublishStrategy<K> {
    pub fn new(destination: Arc<dyn DestinationEndpoint<K>>) -> Self {
        Self {
            destination,
            hooks: Vec::new(),
            destination_lookup: None,
        }
    }

    /// Append a batch post-publish hook.
    pub fn with_hook(mut self, hook: Arc<dyn BatchPostPublishHook<K>>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// After a successful bulk call, resolve each item's destination
    /// reference by its mapped location.
    pub fn with_destination_lookup(mut self, finder: Arc<dyn DestinationFinder>) -> Self {
        self.destination_lookup = Some(finder);
        self
    }

    async fn resolve_destination(&self, item: &MigrationItem<K>, cancel: &CancellationToken) {
        let Some(finder) = &self.destination_lookup else {
            return;
        };
        let mapped = item.entry().mapped_location().await;
        match finder.find_by_mapped_location(&mapped, cancel).await {
            Ok(Some(destination)) => {
                item.entry().destination_found(destination).await;
            }
            Ok(None) => warn!(
                content_type = %K::CONTENT_TYPE,
                source_id = %item.reference().id,
                mapped_location = %mapped,
                "Bulk-published item not found at destination"
            ),
            Err(e) => warn!(
                content_type = %K::CONTENT_TYPE,
                source_id = %item.reference().id,
                mapped_location = %mapped,
                error = %e,
                "Destination lookup failed for bulk-published item"
            ),
        }
    }
}

#[async_trait]
impl<K: ContentKind> PublishStrategy<K> for BulkPublishStrategy<K> {
    async fn migrate_prepared(
        &self,
        batch: &MigrationBatch<K>,
        item: &MigrationItem<K>,
        publish: K::Publish,
    ) -> Result<()> {
        batch.stage(item.clone(), publish).await;
        Ok(())
    }

    async fn complete_batch(
        &self,
        batch: &MigrationBatch<K>,
        caller: &CancellationToken,
    ) -> Result<Vec<Error>> {
        let (items, publishes): (Vec<_>, Vec<_>) = batch.take_staged().await.into_iter().unzip();
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let cancel = batch.cancel_token();
        let outcome = if cancel.is_cancelled() {
            Err(Error::Canceled)
        } else {
            self.destination.publish_batch(&publishes, cancel).await
        };

        if let Err(e) = outcome {
            let (cancellations, failures): (Vec<Error>, Vec<Error>) =
                e.flatten().into_iter().partition(Error::is_cancellation);
            if failures.is_empty() {
                for item in &items {
                    item.entry().set_canceled().await;
                }
            } else {
                warn!(
                    content_type = %K::CONTENT_TYPE,
                    batch_id = %batch.batch_id(),
                    batch_size = items.len(),
                    errors = ?failures,
                    "Bulk publish failed"
                );
                for item in &items {
                    item.entry().set_failed(failures.iter().cloned()).await;
                }
            }
            if !cancellations.is_empty() && caller.is_cancelled() {
                return Err(Error::Canceled);
            }
            return Ok(Vec::new());
        }

        info!(
            content_type = %K::CONTENT_TYPE,
            batch_id = %batch.batch_id(),
            batch_size = items.len(),
            "Bulk publish succeeded"
        );
        for item in &items {
            self.resolve_destination(item, cancel).await;
            item.entry().set_migrated().await;
        }

        let mut errors = Vec::new();
        for hook in &self.hooks {
            if let Err(e) = hook.after_publish_batch(&items, &publishes, cancel).await {
                warn!(
                    hook = hook.name(),
                    batch_id = %batch.batch_id(),
                    error = %e,
                    "Batch post-publish hook failed"
                );
                errors.push(e);
            }
        }
        Ok(errors)
    }
}
