//! Pipeline stages for item preparation.
//!
//! Each stage is an independent object behind a trait so that pipelines are
//! composed per content type at startup and every stage can be tested alone.
//! The mapping stage lives in [`crate::mapping`].

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use waypoint_core::{ContentKind, Error, Publishable, ResourceStore, Result, SourceEndpoint};

use crate::item::MigrationItem;

// =============================================================================
// PULL
// =============================================================================

/// Produces the representation the converter needs from a listed item.
#[async_trait]
pub trait PullStage<K: ContentKind>: Send + Sync {
    async fn pull(&self, item: &MigrationItem<K>, cancel: &CancellationToken)
        -> Result<K::Pulled>;
}

/// Hands the listed snapshot straight to the converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughPull;

#[async_trait]
impl<K> PullStage<K> for PassThroughPull
where
    K: ContentKind,
    K::Source: Clone + Into<K::Pulled>,
{
    async fn pull(
        &self,
        item: &MigrationItem<K>,
        _cancel: &CancellationToken,
    ) -> Result<K::Pulled> {
        Ok(item.source().clone().into())
    }
}

/// Fetches the full representation from the source endpoint.
pub struct EndpointPull<K: ContentKind> {
    endpoint: Arc<dyn SourceEndpoint<K>>,
}

impl<K: ContentKind> EndpointPull<K> {
    pub fn new(endpoint: Arc<dyn SourceEndpoint<K>>) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl<K: ContentKind> PullStage<K> for EndpointPull<K> {
    async fn pull(
        &self,
        item: &MigrationItem<K>,
        cancel: &CancellationToken,
    ) -> Result<K::Pulled> {
        if cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        self.endpoint.pull(item.source(), cancel).await
    }
}

// =============================================================================
// CONVERT
// =============================================================================

/// Maps the pulled representation to the publish representation.
#[async_trait]
pub trait ConvertStage<K: ContentKind>: Send + Sync {
    async fn convert(
        &self,
        pulled: K::Pulled,
        item: &MigrationItem<K>,
        cancel: &CancellationToken,
    ) -> Result<K::Publish>;
}

/// Converter backed by a plain function, for conversions that need no I/O.
pub struct FnConverter<K, F> {
    convert: F,
    _kind: PhantomData<fn() -> K>,
}

impl<K, F> FnConverter<K, F>
where
    K: ContentKind,
    F: Fn(K::Pulled) -> Result<K::Publish> + Send + Sync,
{
    pub fn new(convert: F) -> Self {
        Self {
            convert,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K, F> ConvertStage<K> for FnConverter<K, F>
where
    K: ContentKind,
    F: Fn(K::Pulled) -> Result<K::Publish> + Send + Sync,
{
    async fn convert(
        &self,
        pulled: K::Pulled,
        _item: &MigrationItem<K>,
        _cancel: &CancellationToken,
    ) -> Result<K::Publish> {
        (self.convert)(pulled)
    }
}

// =============================================================================
// TRANSFORM
// =============================================================================

/// One hook in the transform chain.
#[async_trait]
pub trait TransformHook<K: ContentKind>: Send + Sync {
    /// Hook name used in logs.
    fn name(&self) -> &str;

    async fn transform(
        &self,
        publish: &mut K::Publish,
        item: &MigrationItem<K>,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Ordered transform hooks. The first failing hook stops the chain.
pub struct TransformChain<K: ContentKind> {
    hooks: Vec<Arc<dyn TransformHook<K>>>,
}

impl<K: ContentKind> Default for TransformChain<K> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<K: ContentKind> TransformChain<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Arc<dyn TransformHook<K>>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn run(
        &self,
        publish: &mut K::Publish,
        item: &MigrationItem<K>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for hook in &self.hooks {
            if cancel.is_cancelled() {
                return Err(Error::Canceled);
            }
            if let Err(e) = hook.transform(publish, item, cancel).await {
                warn!(
                    hook = hook.name(),
                    source_id = %item.reference().id,
                    error = %e,
                    "Transform hook failed"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

// =============================================================================
// FINALIZE
// =============================================================================

/// Releases editing handles so a publish item is safe to transmit.
#[async_trait]
pub trait FinalizeStage<K: ContentKind>: Send + Sync {
    async fn finalize(&self, publish: &mut K::Publish, cancel: &CancellationToken) -> Result<()>;

    /// Release a publish item that will never be published.
    ///
    /// Runs to completion even when the batch is canceled; failures are
    /// logged, not returned.
    async fn abandon(&self, mut publish: K::Publish) {
        if let Err(e) = self.finalize(&mut publish, &CancellationToken::new()).await {
            warn!(error = %e, "Failed to release abandoned publish item");
        }
    }
}

/// For publish types that never hold resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFinalize;

#[async_trait]
impl<K: ContentKind> FinalizeStage<K> for NoopFinalize {
    async fn finalize(
        &self,
        _publish: &mut K::Publish,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }
}

/// Releases every open resource of the item through the resource store.
///
/// All resources are attempted; failures are reported together.
pub struct ReleaseResources {
    store: Arc<dyn ResourceStore>,
}

impl ReleaseResources {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<K: ContentKind> FinalizeStage<K> for ReleaseResources {
    async fn finalize(&self, publish: &mut K::Publish, cancel: &CancellationToken) -> Result<()> {
        let mut failures = Vec::new();
        for resource in publish.open_resources() {
            if let Err(e) = self.store.release(&resource, cancel).await {
                failures.push(match e {
                    Error::Finalize(_) | Error::Canceled => e,
                    other => Error::Finalize(format!("{resource}: {other}")),
                });
            }
        }
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(Error::Aggregate(failures)),
        }
    }
}
