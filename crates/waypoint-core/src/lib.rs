//! # waypoint-core
//!
//! Core types, traits, and abstractions for the waypoint content migration
//! engine.
//!
//! This crate provides the data model (content references, manifest entries,
//! migration status), the error taxonomy, and the trait seams the engine
//! calls to reach source and destination deployments.

pub mod content;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod traits;

// Re-export commonly used types at crate root
pub use content::{ContentLocation, ContentReference, ContentType};
pub use error::{Error, LookupKind, Result};
pub use manifest::{
    EntryRecord, ManifestEntry, ManifestEntryHandle, ManifestSnapshot, ManifestSummary,
    MigrationManifest, MigrationStatus,
};
pub use traits::*;

// Cancellation tokens are part of every seam signature.
pub use tokio_util::sync::CancellationToken;
