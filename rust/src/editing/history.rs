//! Bounded undo/redo history of committed edits.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::calendar::DayIdx;
use crate::interner::WorkerIdx;
use crate::schedule::Schedule;

/// Identifies one proposed edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EditId(pub u64);

impl fmt::Display for EditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single-slot change: who leaves and who takes the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotChange {
    pub id: EditId,
    pub day: DayIdx,
    pub slot: usize,
    pub outgoing: Option<WorkerIdx>,
    pub incoming: Option<WorkerIdx>,
}

impl SlotChange {
    /// Workers whose statistics the change touches.
    pub fn touched(&self) -> Vec<WorkerIdx> {
        self.outgoing.into_iter().chain(self.incoming).collect()
    }
}

/// A committed change with the schedule versions on either side of it.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub change: SlotChange,
    pub before: Arc<Schedule>,
    pub after: Arc<Schedule>,
}

/// Depths of the undo and redo stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub undo_depth: usize,
    pub redo_depth: usize,
    pub capacity: usize,
    pub version: u64,
}

/// Undo stack bounded to `capacity` entries, oldest dropped first.
#[derive(Debug)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(capacity.min(64)),
            redo: Vec::new(),
            capacity,
        }
    }

    /// Record a fresh commit. Any redo entries are invalidated.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.push_undo(entry);
    }

    fn push_undo(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.undo.len() >= self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(entry);
    }

    pub fn last_committed(&self) -> Option<&HistoryEntry> {
        self.undo.back()
    }

    /// Pop the newest commit and move it onto the redo stack.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        let entry = self.undo.pop_back()?;
        self.redo.push(entry);
        self.redo.last()
    }

    /// Pop the newest undone commit and move it back onto the undo stack.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        let entry = self.redo.pop()?;
        self.push_undo(entry);
        self.undo.back()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn entry(id: u64) -> HistoryEntry {
        let before = Schedule::empty(d(2025, 1, 1), 3, 1, 2);
        let mut after = before.clone();
        after.assign(0, 0, 1);
        HistoryEntry {
            change: SlotChange {
                id: EditId(id),
                day: 0,
                slot: 0,
                outgoing: None,
                incoming: Some(1),
            },
            before: Arc::new(before),
            after: Arc::new(after),
        }
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::new(2);
        history.record(entry(1));
        history.record(entry(2));
        history.record(entry(3));
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.undo().map(|e| e.change.id), Some(EditId(3)));
        assert_eq!(history.undo().map(|e| e.change.id), Some(EditId(2)));
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_new_commit_clears_redo() {
        let mut history = History::new(8);
        history.record(entry(1));
        history.undo();
        assert_eq!(history.redo_depth(), 1);

        assert_eq!(history.redo().map(|e| e.change.id), Some(EditId(1)));
        assert_eq!(history.redo_depth(), 0);
        history.undo();
        history.record(entry(2));
        assert_eq!(history.redo_depth(), 0);
        assert_eq!(history.last_committed().map(|e| e.change.id), Some(EditId(2)));
    }

    #[test]
    fn test_touched_workers() {
        let change = SlotChange {
            id: EditId(1),
            day: 0,
            slot: 0,
            outgoing: Some(3),
            incoming: Some(5),
        };
        assert_eq!(change.touched(), vec![3, 5]);
        assert_eq!(EditId(7).to_string(), "#7");
    }
}
