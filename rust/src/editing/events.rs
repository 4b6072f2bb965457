//! Change-event stream for listeners of the incremental update engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events buffered per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 256;

/// What produced a new schedule version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Commit,
    Undo,
    Redo,
}

/// One applied change to the published schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Schedule version after the change.
    pub version: u64,
    pub kind: ChangeKind,
    pub date: NaiveDate,
    pub slot: usize,
    /// Worker removed from the slot, if any.
    pub outgoing: Option<String>,
    /// Worker placed in the slot, if any.
    pub incoming: Option<String>,
    /// Whether balance statistics were recomputed for every worker.
    pub full_recompute: bool,
}

/// Broadcasts change events to any number of subscribers.
///
/// Publishing never blocks; slow subscribers lose the oldest events.
pub struct EventBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    /// Create a new subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
