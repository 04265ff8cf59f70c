//! # waypoint-engine
//!
//! Batch execution engine for waypoint content migration.
//!
//! This crate provides:
//! - Per-item preparation pipelines (pull, convert, mapping, transform, finalize)
//! - A registry resolving the pipeline of each content type
//! - Sequential and parallel batch migrators with batch-local cancellation
//! - Item and bulk publish strategies
//! - A driver that filters, maps and batches a source listing
//! - Engine configuration, progress events and tracing initialisation

pub mod batch;
pub mod config;
pub mod driver;
pub mod events;
pub mod item;
pub mod mapping;
pub mod migrator;
pub mod parallel;
pub mod preparer;
pub mod registry;
pub mod stages;
pub mod strategy;
pub mod telemetry;

#[cfg(test)]
mod testing;

// Re-export commonly used types at crate root
pub use batch::{BatchResult, ItemResult, MigrationBatch};
pub use config::{EngineConfig, EngineConfigSource, SharedEngineConfig};
pub use driver::{ContentMigrationResult, ContentMigrator};
pub use events::MigrationEvent;
pub use item::MigrationItem;
pub use mapping::MappingStage;
pub use migrator::{BatchMigrator, SequentialBatchMigrator};
pub use parallel::ParallelBatchMigrator;
pub use preparer::{ContentPipeline, ItemPreparer};
pub use registry::PipelineRegistry;
pub use stages::{
    ConvertStage, EndpointPull, FinalizeStage, FnConverter, NoopFinalize, PassThroughPull,
    PullStage, ReleaseResources, TransformChain, TransformHook,
};
pub use strategy::{
    BatchPostPublishHook, BulkPublishStrategy, ItemPublishStrategy, PostPublishHook,
    PublishStrategy,
};
pub use telemetry::{init_tracing, LogConfig, LogFormat};

// Re-export core types for convenience
pub use waypoint_core::{
    CancellationToken, ContentKind, ContentLocation, ContentReference, ContentType, Error,
    MigrationManifest, MigrationStatus, Result,
};
