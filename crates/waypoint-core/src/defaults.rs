//! Centralized default constants for waypoint.
//!
//! **This module is the single source of truth** for shared default values.
//! Engine configuration and tests reference these instead of repeating
//! literals.

// =============================================================================
// BATCH EXECUTION
// =============================================================================

/// Default number of source items carved into one batch.
pub const BATCH_SIZE: usize = 100;

/// Default maximum concurrent item tasks within a batch.
///
/// Kept low: every item task holds at least one outbound connection to the
/// destination, and the destination throttles per site.
pub const MAX_PARALLELISM: usize = 10;

/// Whether a failed item stops the rest of its batch by default.
pub const HALT_BATCH_ON_FAILURE: bool = false;

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

/// Environment variable overriding [`MAX_PARALLELISM`].
pub const ENV_MAX_PARALLELISM: &str = "MIGRATION_MAX_PARALLELISM";

/// Environment variable overriding [`BATCH_SIZE`].
pub const ENV_BATCH_SIZE: &str = "MIGRATION_BATCH_SIZE";

/// Environment variable overriding [`HALT_BATCH_ON_FAILURE`].
pub const ENV_HALT_BATCH_ON_FAILURE: &str = "MIGRATION_HALT_BATCH_ON_FAILURE";

// =============================================================================
// EVENTS
// =============================================================================

/// Default engine event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;
