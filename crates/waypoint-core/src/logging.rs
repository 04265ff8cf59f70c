//! Structured logging schema and field name constants for waypoint.
//!
//! All crates use these constants for consistent structured logging fields so
//! that a migration run can be audited by querying logs per item or batch.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Item task panicked, batch could not run at all |
//! | WARN  | Item failed, bulk publish failed, manifest update rejected |
//! | INFO  | Batch and content-type lifecycle (started, completed) |
//! | DEBUG | Stage decisions (mapping resolution, strategy choice, config) |
//! | TRACE | Per-item stage entry/exit |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "engine"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Values: "sequential", "parallel", "driver"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "migrate_batch", "migrate"
pub const OPERATION: &str = "op";

/// Content type being migrated (snake_case, see `ContentType::as_str`).
pub const CONTENT_TYPE: &str = "content_type";

/// Identifier of the migration batch (UUIDv7).
pub const BATCH_ID: &str = "batch_id";

/// Pipeline stage name.
/// Values: "pull", "convert", "map", "transform", "finalize", "publish"
pub const STAGE: &str = "stage";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Source item id.
pub const SOURCE_ID: &str = "source_id";

/// Source item location (slash-joined).
pub const SOURCE_LOCATION: &str = "source_location";

/// Destination item id.
pub const DESTINATION_ID: &str = "destination_id";

/// Mapped, destination-bound location (slash-joined).
pub const MAPPED_LOCATION: &str = "mapped_location";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of items in a batch.
pub const BATCH_SIZE: &str = "batch_size";

/// Maximum concurrent item tasks for a batch.
pub const MAX_PARALLELISM: &str = "max_parallelism";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Final item status.
pub const STATUS: &str = "status";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
