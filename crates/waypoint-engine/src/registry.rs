//! Pipeline registry for resolving per-content-type item preparers.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use waypoint_core::{ContentKind, ContentType, Error, Result};

use crate::preparer::{ContentPipeline, ItemPreparer};

/// Registry mapping content types to their assembled preparers.
///
/// Populated once at startup; read-only afterwards.
pub struct PipelineRegistry {
    preparers: HashMap<ContentType, Arc<dyn Any + Send + Sync>>,
}

impl PipelineRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            preparers: HashMap::new(),
        }
    }

    /// Register a pipeline. Replaces any existing pipeline for the same
    /// content type.
    pub fn register<K: ContentKind>(&mut self, pipeline: ContentPipeline<K>) -> &mut Self {
        let preparer: Arc<ItemPreparer<K>> = Arc::new(pipeline.build());
        debug!(
            content_type = %K::CONTENT_TYPE,
            transforms = preparer.transform_count(),
            "Registered content pipeline"
        );
        self.preparers.insert(K::CONTENT_TYPE, preparer);
        self
    }

    /// Resolve the preparer for `K`.
    pub fn preparer<K: ContentKind>(&self) -> Result<Arc<ItemPreparer<K>>> {
        let entry = self.preparers.get(&K::CONTENT_TYPE).ok_or_else(|| {
            Error::Config(format!(
                "No pipeline registered for content type: {}",
                K::CONTENT_TYPE
            ))
        })?;
        Arc::clone(entry)
            .downcast::<ItemPreparer<K>>()
            .map_err(|_| {
                Error::Config(format!(
                    "Pipeline registered for {} belongs to a different content kind",
                    K::CONTENT_TYPE
                ))
            })
    }

    /// Check if a pipeline is registered for the given content type.
    pub fn has_pipeline(&self, content_type: ContentType) -> bool {
        self.preparers.contains_key(&content_type)
    }

    /// All content types with a registered pipeline, in migration order.
    pub fn content_types(&self) -> Vec<ContentType> {
        let mut types: Vec<ContentType> = self.preparers.keys().copied().collect();
        types.sort();
        types
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
