//! Item preparer: runs pull, convert, mapping, transform and finalize for one
//! item and hands back a publish-ready value.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use waypoint_core::{ContentKind, Error, Result};

use crate::item::MigrationItem;
use crate::mapping::MappingStage;
use crate::stages::{
    ConvertStage, FinalizeStage, NoopFinalize, PullStage, TransformChain, TransformHook,
};

/// Stage set for one content kind, assembled at startup.
///
/// A pipeline without an explicit mapping stage maps without container
/// lookups; one without a finalizer uses [`NoopFinalize`].
pub struct ContentPipeline<K: ContentKind> {
    pull: Arc<dyn PullStage<K>>,
    convert: Arc<dyn ConvertStage<K>>,
    mapping: Option<MappingStage<K>>,
    transforms: TransformChain<K>,
    finalizer: Option<Arc<dyn FinalizeStage<K>>>,
}

impl<K: ContentKind> ContentPipeline<K> {
    pub fn new(pull: Arc<dyn PullStage<K>>, convert: Arc<dyn ConvertStage<K>>) -> Self {
        Self {
            pull,
            convert,
            mapping: None,
            transforms: TransformChain::new(),
            finalizer: None,
        }
    }

    pub fn with_mapping(mut self, mapping: MappingStage<K>) -> Self {
        self.mapping = Some(mapping);
        self
    }

    /// Append a transform hook. Hooks run in the order they were added.
    pub fn with_transform(mut self, hook: Arc<dyn TransformHook<K>>) -> Self {
        self.transforms.push(hook);
        self
    }

    pub fn with_finalizer(mut self, finalizer: Arc<dyn FinalizeStage<K>>) -> Self {
        self.finalizer = Some(finalizer);
        self
    }

    pub fn build(self) -> ItemPreparer<K> {
        ItemPreparer {
            pull: self.pull,
            convert: self.convert,
            mapping: self
                .mapping
                .unwrap_or_else(MappingStage::without_container_lookup),
            transforms: self.transforms,
            finalizer: self.finalizer.unwrap_or_else(|| Arc::new(NoopFinalize)),
        }
    }
}

/// Turns a migration item into its publish-ready representation.
pub struct ItemPreparer<K: ContentKind> {
    pull: Arc<dyn PullStage<K>>,
    convert: Arc<dyn ConvertStage<K>>,
    mapping: MappingStage<K>,
    transforms: TransformChain<K>,
    finalizer: Arc<dyn FinalizeStage<K>>,
}

impl<K: ContentKind> ItemPreparer<K> {
    /// Start assembling a preparer from its two mandatory stages.
    pub fn builder(
        pull: Arc<dyn PullStage<K>>,
        convert: Arc<dyn ConvertStage<K>>,
    ) -> ContentPipeline<K> {
        ContentPipeline::new(pull, convert)
    }

    pub fn transform_count(&self) -> usize {
        self.transforms.len()
    }

    /// Run every stage for `item`.
    ///
    /// The manifest entry is only read, never written: the caller records the
    /// outcome. Finalize runs whenever conversion succeeded and mapping did not
    /// fail; a transform failure and a finalize failure are returned together.
    /// An item that fails mapping or finalize is handed to the finalizer's
    /// `abandon`, so its resources are released on every exit path.
    pub async fn prepare(
        &self,
        item: &MigrationItem<K>,
        cancel: &CancellationToken,
    ) -> Result<K::Publish> {
        let start = Instant::now();
        let source_id = item.reference().id;

        trace!(
            content_type = %K::CONTENT_TYPE,
            source_id = %source_id,
            stage = "pull",
            "Preparing item"
        );
        let pulled = self.pull.pull(item, cancel).await?;

        trace!(
            content_type = %K::CONTENT_TYPE,
            source_id = %source_id,
            stage = "convert",
            "Preparing item"
        );
        let mut publish = self.convert.convert(pulled, item, cancel).await?;

        let mapped_location = item.entry().mapped_location().await;
        if let Err(e) = self.mapping.apply(&mut publish, &mapped_location, cancel).await {
            debug!(
                content_type = %K::CONTENT_TYPE,
                source_id = %source_id,
                mapped_location = %mapped_location,
                error = %e,
                "Mapping failed, abandoning converted item"
            );
            self.finalizer.abandon(publish).await;
            return Err(e);
        }

        let transform_err = self.transforms.run(&mut publish, item, cancel).await.err();
        if let Err(finalize_err) = self.finalizer.finalize(&mut publish, cancel).await {
            // Resources may still be held; release them outside the batch token.
            debug!(
                content_type = %K::CONTENT_TYPE,
                source_id = %source_id,
                error = %finalize_err,
                "Finalize failed, abandoning prepared item"
            );
            self.finalizer.abandon(publish).await;
            return Err(match transform_err {
                Some(transform_err) => Error::Aggregate(vec![transform_err, finalize_err]),
                None => finalize_err,
            });
        }
        if let Some(e) = transform_err {
            return Err(e);
        }

        debug!(
            content_type = %K::CONTENT_TYPE,
            source_id = %source_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Item prepared"
        );
        Ok(publish)
    }
}
