//! Core traits for waypoint abstractions.
//!
//! These traits define the seams between the migration engine and the
//! deployments it talks to. Concrete REST clients, retry policies and
//! manifest file formats live behind them, which keeps the engine testable
//! with in-memory fakes.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::content::{ContentLocation, ContentReference, ContentType};
use crate::error::Result;

// =============================================================================
// CONTENT KINDS
// =============================================================================

/// Immutable snapshot of an item as listed at the source.
pub trait SourceItem: Send + Sync + 'static {
    fn reference(&self) -> &ContentReference;
}

impl SourceItem for ContentReference {
    fn reference(&self) -> &ContentReference {
        self
    }
}

/// Identifier of a staged resource (temp file, open edit session) held by a
/// publish item.
pub type ResourceId = String;

/// Optional behaviours a publish type takes part in.
///
/// Resolved once per content type, so the mapping stage never inspects items
/// to discover what they support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentCapabilities {
    /// The item lives inside a container (project, personal space) whose
    /// path participates in remapping.
    pub container: bool,
    /// The item's own location is set from the mapped location.
    pub directly_mappable: bool,
}

impl ContentCapabilities {
    /// No optional behaviour.
    pub const NONE: ContentCapabilities = ContentCapabilities {
        container: false,
        directly_mappable: false,
    };

    pub const fn with_container(self) -> Self {
        ContentCapabilities {
            container: true,
            ..self
        }
    }

    pub const fn with_direct_mapping(self) -> Self {
        ContentCapabilities {
            directly_mappable: true,
            ..self
        }
    }
}

/// Publish-ready representation of an item.
///
/// The accessor methods only matter for the capabilities the type declares;
/// the defaults suit types that declare none.
pub trait Publishable: Send + Sync + 'static {
    /// Capability set for this publish type.
    fn capabilities() -> ContentCapabilities
    where
        Self: Sized;

    /// Current container. Before mapping this is the source container.
    fn container(&self) -> Option<&ContentReference> {
        None
    }

    fn set_container(&mut self, _container: Option<ContentReference>) {}

    fn set_location(&mut self, _location: ContentLocation) {}

    /// Staged resources that must be released before publishing.
    fn open_resources(&self) -> Vec<ResourceId> {
        Vec::new()
    }
}

/// Result returned by the destination after publishing one item.
pub trait PublishedItem: Send + Sync + 'static {
    fn destination_reference(&self) -> ContentReference;
}

impl PublishedItem for ContentReference {
    fn destination_reference(&self) -> ContentReference {
        self.clone()
    }
}

/// Type family describing one migratable content type end to end.
pub trait ContentKind: Send + Sync + 'static {
    /// Content type key used by the registry and the manifest.
    const CONTENT_TYPE: ContentType;

    /// Listed source snapshot.
    type Source: SourceItem;
    /// Richer representation returned by the pull stage.
    type Pulled: Send + 'static;
    /// Publish-ready representation.
    type Publish: Publishable;
    /// Destination's response to a single publish.
    type Published: PublishedItem;
}

// =============================================================================
// ENDPOINTS
// =============================================================================

/// Source deployment access for one content kind.
#[async_trait]
pub trait SourceEndpoint<K: ContentKind>: Send + Sync {
    /// Fetch the full representation of a listed item.
    async fn pull(&self, item: &K::Source, cancel: &CancellationToken) -> Result<K::Pulled>;
}

/// Destination deployment access for one content kind.
#[async_trait]
pub trait DestinationEndpoint<K: ContentKind>: Send + Sync {
    /// Publish a single item.
    async fn publish(&self, item: &K::Publish, cancel: &CancellationToken)
        -> Result<K::Published>;

    /// Publish a whole batch in one call.
    async fn publish_batch(&self, items: &[K::Publish], cancel: &CancellationToken)
        -> Result<()>;
}

/// Resolves destination references for already-migrated content.
///
/// "Not found" is `Ok(None)`; callers decide whether that is fatal.
#[async_trait]
pub trait DestinationFinder: Send + Sync {
    /// Find the destination item migrated from the item at `location` on the
    /// source.
    async fn find_by_source_location(
        &self,
        location: &ContentLocation,
        cancel: &CancellationToken,
    ) -> Result<Option<ContentReference>>;

    /// Find the destination item at the destination-bound `location`.
    async fn find_by_mapped_location(
        &self,
        location: &ContentLocation,
        cancel: &CancellationToken,
    ) -> Result<Option<ContentReference>>;
}

/// Store that owns staged files and edit sessions.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Flush and close a staged resource so it is safe to transmit.
    async fn release(&self, resource: &ResourceId, cancel: &CancellationToken) -> Result<()>;
}

// =============================================================================
// MAPPING AND FILTERING
// =============================================================================

/// Computes the destination-bound location of a source item.
pub trait LocationMapper: Send + Sync {
    fn map(&self, content_type: ContentType, source: &ContentReference) -> ContentLocation;
}

/// Keeps every item at its source location.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl LocationMapper for IdentityMapper {
    fn map(&self, _content_type: ContentType, source: &ContentReference) -> ContentLocation {
        source.location.clone()
    }
}

/// Rewrites a leading path prefix; the first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct PrefixMapper {
    rules: Vec<(ContentLocation, ContentLocation)>,
}

impl PrefixMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule moving everything under `from` to under `to`.
    pub fn with_rule(mut self, from: ContentLocation, to: ContentLocation) -> Self {
        self.rules.push((from, to));
        self
    }
}

impl LocationMapper for PrefixMapper {
    fn map(&self, _content_type: ContentType, source: &ContentReference) -> ContentLocation {
        self.rules
            .iter()
            .find_map(|(from, to)| source.location.replace_prefix(from, to))
            .unwrap_or_else(|| source.location.clone())
    }
}

/// Decides whether a listed item takes part in the migration.
pub trait ContentFilter<K: ContentKind>: Send + Sync {
    fn include(&self, item: &K::Source) -> bool;
}
