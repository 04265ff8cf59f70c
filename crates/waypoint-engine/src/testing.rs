//! In-memory content kind and fakes shared by unit tests.

use std::sync::Arc;

use uuid::Uuid;

use waypoint_core::{
    ContentCapabilities, ContentKind, ContentLocation, ContentReference, ContentType,
    ManifestEntry, ManifestEntryHandle, Publishable, ResourceId, SourceItem,
};

use crate::item::MigrationItem;

pub(crate) struct TestWorkbooks;

#[derive(Debug, Clone)]
pub(crate) struct SourceWorkbook {
    pub reference: ContentReference,
    pub project: Option<ContentReference>,
}

impl SourceItem for SourceWorkbook {
    fn reference(&self) -> &ContentReference {
        &self.reference
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PublishWorkbook {
    pub location: ContentLocation,
    pub project: Option<ContentReference>,
    pub resources: Vec<ResourceId>,
    pub applied_hooks: Vec<String>,
}

impl PublishWorkbook {
    pub fn from_source(source: &SourceWorkbook) -> Self {
        Self {
            location: source.reference.location.clone(),
            project: source.project.clone(),
            resources: Vec::new(),
            applied_hooks: Vec::new(),
        }
    }
}

impl Publishable for PublishWorkbook {
    fn capabilities() -> ContentCapabilities {
        ContentCapabilities::NONE
            .with_container()
            .with_direct_mapping()
    }

    fn container(&self) -> Option<&ContentReference> {
        self.project.as_ref()
    }

    fn set_container(&mut self, container: Option<ContentReference>) {
        self.project = container;
    }

    fn set_location(&mut self, location: ContentLocation) {
        self.location = location;
    }

    fn open_resources(&self) -> Vec<ResourceId> {
        self.resources.clone()
    }
}

impl ContentKind for TestWorkbooks {
    const CONTENT_TYPE: ContentType = ContentType::Workbook;
    type Source = SourceWorkbook;
    type Pulled = SourceWorkbook;
    type Publish = PublishWorkbook;
    type Published = ContentReference;
}

pub(crate) fn reference(segments: &[&str]) -> ContentReference {
    ContentReference::new(
        Uuid::new_v4(),
        segments.last().copied().unwrap_or_default().to_lowercase(),
        ContentLocation::from_segments(segments.iter().copied()),
    )
}

/// Workbook at `segments` whose project is the parent path.
pub(crate) fn workbook_item(segments: &[&str]) -> MigrationItem<TestWorkbooks> {
    let reference = reference(segments);
    let parent = reference.location.parent();
    let project = if parent.is_empty() {
        None
    } else {
        Some(ContentReference::new(Uuid::new_v4(), "", parent))
    };
    let source = SourceWorkbook { reference, project };
    let entry = ManifestEntryHandle::new(ManifestEntry::unmapped(source.reference.clone()));
    MigrationItem::new(Arc::new(source), entry)
}

/// Workbook whose manifest entry maps it to `mapped`.
pub(crate) fn mapped_workbook_item(
    segments: &[&str],
    mapped: &[&str],
) -> MigrationItem<TestWorkbooks> {
    let item = workbook_item(segments);
    let entry = ManifestEntryHandle::new(ManifestEntry::new(
        item.reference().clone(),
        ContentLocation::from_segments(mapped.iter().copied()),
    ));
    MigrationItem::new(item.source_arc(), entry)
}
