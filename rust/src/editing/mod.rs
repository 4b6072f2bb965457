//! Post-publication editing: staged single-slot edits, undo/redo, change events.

mod engine;
mod events;
mod history;

pub use engine::{EditCheck, EditState, EngineError, HistoryDirection, UpdateEngine};
pub use events::{ChangeEvent, ChangeKind, EventBus};
pub use history::{EditId, History, HistoryEntry, HistoryStats, SlotChange};
