//! Parallel batch migrator.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use waypoint_core::{ContentKind, Result};

use crate::batch::{BatchResult, MigrationBatch};
use crate::config::EngineConfigSource;
use crate::events::{EventEmitter, MigrationEvent};
use crate::item::MigrationItem;
use crate::migrator::{BatchEngine, BatchMigrator};
use crate::preparer::ItemPreparer;
use crate::strategy::PublishStrategy;

/// Migrates the items of a batch concurrently.
///
/// Concurrency is bounded by `max_parallelism`, read from the configuration
/// source once at the start of every batch.
pub struct ParallelBatchMigrator<K: ContentKind> {
    engine: BatchEngine<K>,
    config: Arc<dyn EngineConfigSource>,
}

impl<K: ContentKind> ParallelBatchMigrator<K> {
    pub fn new(
        preparer: Arc<ItemPreparer<K>>,
        strategy: Arc<dyn PublishStrategy<K>>,
        config: Arc<dyn EngineConfigSource>,
    ) -> Self {
        Self {
            engine: BatchEngine::new(preparer, strategy),
            config,
        }
    }

    /// Broadcast progress events on `tx`.
    pub fn with_events(mut self, tx: tokio::sync::broadcast::Sender<MigrationEvent>) -> Self {
        self.engine.set_events(EventEmitter::new(tx));
        self
    }
}

#[async_trait]
impl<K: ContentKind> BatchMigrator<K> for ParallelBatchMigrator<K> {
    #[instrument(
        skip(self, items, cancel),
        fields(
            subsystem = "engine",
            component = "parallel",
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
        let config = self.config.current();
        let max_parallelism = config.max_parallelism.max(1);

        let batch = Arc::new(
            MigrationBatch::new(items, cancel).with_halt_on_failure(config.halt_batch_on_failure),
        );
        self.engine.started(&batch);
        debug!(max_parallelism, "Spawning item tasks");

        let semaphore = Arc::new(Semaphore::new(max_parallelism));
        let mut tasks = JoinSet::new();

        for index in 0..batch.len() {
            let engine = self.engine.clone();
            let batch = Arc::clone(&batch);
            let semaphore = Arc::clone(&semaphore);
            let caller = cancel.clone();
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let item = &batch.items()[index];
                match AssertUnwindSafe(engine.run_item(&batch, item, &caller))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!(
                            content_type = %K::CONTENT_TYPE,
                            source_id = %item.reference().id,
                            "Item task panicked"
                        );
                        engine.record_panic(&batch, item).await;
                        Ok(())
                    }
                }
            });
        }

        let mut caller_canceled = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    if !caller_canceled {
                        caller_canceled = true;
                        batch.cancel();
                    }
                }
                Err(e) => error!(error = ?e, "Item task failed to join"),
            }
        }

        if caller_canceled {
            return Err(self.engine.abort(&batch).await);
        }
        self.engine.finish(&batch, cancel, start).await
    }
}
