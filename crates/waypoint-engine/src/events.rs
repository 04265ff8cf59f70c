//! Engine events broadcast to progress observers.

use tokio::sync::broadcast;
use uuid::Uuid;

use waypoint_core::{defaults, ContentType, MigrationStatus};

/// Event emitted by the batch engine.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationEvent {
    /// A batch was handed to a migrator.
    BatchStarted {
        batch_id: Uuid,
        content_type: ContentType,
        size: usize,
    },
    /// An item reached its final status for this attempt.
    ItemCompleted {
        batch_id: Uuid,
        content_type: ContentType,
        source_id: Uuid,
        status: MigrationStatus,
    },
    /// All items of a batch have a final status.
    BatchCompleted {
        batch_id: Uuid,
        content_type: ContentType,
        migrated: usize,
        failed: usize,
        canceled: usize,
        duration_ms: u64,
    },
}

/// Create a new event channel with the default capacity.
pub fn channel() -> (broadcast::Sender<MigrationEvent>, broadcast::Receiver<MigrationEvent>) {
    broadcast::channel(defaults::EVENT_BUS_CAPACITY)
}

/// Optional sender; emitting without one, or without receivers, is a no-op.
#[derive(Clone, Default)]
pub(crate) struct EventEmitter {
    tx: Option<broadcast::Sender<MigrationEvent>>,
}

impl EventEmitter {
    pub(crate) fn new(tx: broadcast::Sender<MigrationEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub(crate) fn emit(&self, event: MigrationEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
