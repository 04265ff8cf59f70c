//! Content identity: locations, references, and content types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hierarchical location of a content item, as ordered path segments.
///
/// A workbook `Quarterly` inside project `Finance/Reports` has the location
/// `["Finance", "Reports", "Quarterly"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentLocation {
    segments: Vec<String>,
}

impl ContentLocation {
    /// The empty (top-level) location.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a location from path segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True for the top-level location.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Location with the last segment dropped. The parent of a top-level item
    /// is the empty location.
    pub fn parent(&self) -> ContentLocation {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    /// Location with `segment` appended.
    pub fn append(&self, segment: impl Into<String>) -> ContentLocation {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// True if `prefix` is a leading run of this location's segments.
    pub fn starts_with(&self, prefix: &ContentLocation) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Replace the leading `prefix` with `replacement`. Returns `None` when the
    /// location does not start with `prefix`.
    pub fn replace_prefix(
        &self,
        prefix: &ContentLocation,
        replacement: &ContentLocation,
    ) -> Option<ContentLocation> {
        if !self.starts_with(prefix) {
            return None;
        }
        let mut segments = replacement.segments.clone();
        segments.extend_from_slice(&self.segments[prefix.segments.len()..]);
        Some(Self { segments })
    }
}

impl std::fmt::Display for ContentLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Immutable identity plus location of an item on one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentReference {
    /// Deployment-assigned identifier.
    pub id: Uuid,
    /// URL-safe name used by the REST surface; may be empty for content
    /// types that have none.
    pub content_url: String,
    /// Hierarchical location.
    pub location: ContentLocation,
}

impl ContentReference {
    pub fn new(id: Uuid, content_url: impl Into<String>, location: ContentLocation) -> Self {
        Self {
            id,
            content_url: content_url.into(),
            location,
        }
    }

    /// Display name (last location segment).
    pub fn name(&self) -> &str {
        self.location.name().unwrap_or_default()
    }
}

/// Kind of migratable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    User,
    Group,
    Project,
    DataSource,
    Workbook,
    CustomView,
    ExtractRefreshTask,
    Subscription,
}

impl ContentType {
    /// Stable snake_case name used in logs and manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::User => "user",
            ContentType::Group => "group",
            ContentType::Project => "project",
            ContentType::DataSource => "data_source",
            ContentType::Workbook => "workbook",
            ContentType::CustomView => "custom_view",
            ContentType::ExtractRefreshTask => "extract_refresh_task",
            ContentType::Subscription => "subscription",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
