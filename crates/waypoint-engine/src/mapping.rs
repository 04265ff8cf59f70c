//! Apply-mapping stage: place a publish item at its destination-bound
//! location and resolve its destination container.

use std::marker::PhantomData;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use waypoint_core::{
    ContentCapabilities, ContentKind, ContentLocation, DestinationFinder, Error, LookupKind,
    Publishable, Result,
};

/// Mapping stage for one content kind.
///
/// The capability set is read from the publish type once, at construction.
pub struct MappingStage<K: ContentKind> {
    capabilities: ContentCapabilities,
    container_finder: Option<Arc<dyn DestinationFinder>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ContentKind> MappingStage<K> {
    /// Mapping stage resolving containers through `container_finder`.
    pub fn new(container_finder: Arc<dyn DestinationFinder>) -> Self {
        Self {
            capabilities: <K::Publish as Publishable>::capabilities(),
            container_finder: Some(container_finder),
            _kind: PhantomData,
        }
    }

    /// Mapping stage without a container finder. Only valid for kinds that
    /// have no container, or whose items are all mapped to the top level.
    pub fn without_container_lookup() -> Self {
        Self {
            capabilities: <K::Publish as Publishable>::capabilities(),
            container_finder: None,
            _kind: PhantomData,
        }
    }

    pub fn capabilities(&self) -> ContentCapabilities {
        self.capabilities
    }

    /// Apply `mapped_location` to `publish`.
    ///
    /// Container rules, for items that have the container capability:
    /// - mapped parent empty: the item goes to the top level.
    /// - mapped parent differs from the source container path: the item was
    ///   re-parented; the container is looked up by the mapped path.
    /// - mapped parent equals the source container path: the container is
    ///   looked up by its source path, since it may have been renamed.
    /// - no source container: left unset.
    ///
    /// A lookup that finds nothing is a hard failure.
    pub async fn apply(
        &self,
        publish: &mut K::Publish,
        mapped_location: &ContentLocation,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.capabilities.container {
            let mapped_parent = mapped_location.parent();
            if mapped_parent.is_empty() {
                publish.set_container(None);
            } else if let Some(source_container) = publish.container().cloned() {
                let source_path = source_container.location;
                let resolved = if mapped_parent != source_path {
                    debug!(
                        content_type = %K::CONTENT_TYPE,
                        source_location = %source_path,
                        mapped_location = %mapped_parent,
                        "Item re-parented, resolving container by mapped location"
                    );
                    self.finder()?
                        .find_by_mapped_location(&mapped_parent, cancel)
                        .await?
                        .ok_or(Error::MappingResolution {
                            location: mapped_parent,
                            by: LookupKind::MappedLocation,
                        })?
                } else {
                    self.finder()?
                        .find_by_source_location(&source_path, cancel)
                        .await?
                        .ok_or(Error::MappingResolution {
                            location: source_path,
                            by: LookupKind::SourceLocation,
                        })?
                };
                publish.set_container(Some(resolved));
            }
        }

        if self.capabilities.directly_mappable {
            publish.set_location(mapped_location.clone());
        }

        Ok(())
    }

    fn finder(&self) -> Result<&Arc<dyn DestinationFinder>> {
        self.container_finder.as_ref().ok_or_else(|| {
            Error::Config(format!(
                "No container finder configured for {}",
                K::CONTENT_TYPE
            ))
        })
    }
}
