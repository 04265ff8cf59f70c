//! Engine configuration.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use waypoint_core::defaults;

/// Configuration for the batch engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of concurrent item tasks in one batch.
    pub max_parallelism: usize,
    /// Number of source items carved into one batch.
    pub batch_size: usize,
    /// Whether a failed item cancels the rest of its batch.
    pub halt_batch_on_failure: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallelism: defaults::MAX_PARALLELISM,
            batch_size: defaults::BATCH_SIZE,
            halt_batch_on_failure: defaults::HALT_BATCH_ON_FAILURE,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `MIGRATION_MAX_PARALLELISM` | `10` | Max concurrent item tasks per batch |
    /// | `MIGRATION_BATCH_SIZE` | `100` | Items per batch |
    /// | `MIGRATION_HALT_BATCH_ON_FAILURE` | `false` | Stop a batch at its first failed item |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_parallelism = lookup(defaults::ENV_MAX_PARALLELISM)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::MAX_PARALLELISM)
            .max(1);

        let batch_size = lookup(defaults::ENV_BATCH_SIZE)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::BATCH_SIZE)
            .max(1);

        let halt_batch_on_failure = lookup(defaults::ENV_HALT_BATCH_ON_FAILURE)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults::HALT_BATCH_ON_FAILURE);

        Self {
            max_parallelism,
            batch_size,
            halt_batch_on_failure,
        }
    }

    /// Set maximum concurrent item tasks.
    pub fn with_max_parallelism(mut self, max: usize) -> Self {
        self.max_parallelism = max;
        self
    }

    /// Set items per batch.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Stop a batch at its first failed item.
    pub fn with_halt_batch_on_failure(mut self, halt: bool) -> Self {
        self.halt_batch_on_failure = halt;
        self
    }
}

/// Where a batch migrator reads its configuration.
///
/// Migrators call [`current`](Self::current) once at the start of each batch
/// and keep that copy until the batch completes.
pub trait EngineConfigSource: Send + Sync {
    fn current(&self) -> EngineConfig;
}

impl EngineConfigSource for EngineConfig {
    fn current(&self) -> EngineConfig {
        self.clone()
    }
}

/// Live configuration that can be changed between batches.
#[derive(Clone)]
pub struct SharedEngineConfig {
    tx: watch::Sender<EngineConfig>,
}

impl SharedEngineConfig {
    pub fn new(config: EngineConfig) -> Self {
        let (tx, _rx) = watch::channel(config);
        Self { tx }
    }

    /// Replace the configuration. Batches already running keep their copy.
    pub fn update(&self, config: EngineConfig) {
        self.tx.send_replace(config);
    }

    /// Receiver that observes every update.
    pub fn subscribe(&self) -> watch::Receiver<EngineConfig> {
        self.tx.subscribe()
    }
}

impl EngineConfigSource for SharedEngineConfig {
    fn current(&self) -> EngineConfig {
        self.tx.borrow().clone()
    }
}
