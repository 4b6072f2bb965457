//! The schedule: day/slot assignments with a per-worker index.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::calendar::{DayIdx, DayKind};
use crate::constraints::ConstraintModel;
use crate::interner::WorkerIdx;

/// Read access to assignments, as needed by the hard-constraint rules.
///
/// Implemented by [`Schedule`] and by staged views that overlay a pending edit
/// on an authoritative schedule without mutating it.
pub trait ScheduleView {
    fn num_days(&self) -> usize;

    fn slots_per_day(&self) -> usize;

    fn occupant(&self, day: DayIdx, slot: usize) -> Option<WorkerIdx>;

    /// Whether `worker` holds any slot on `day`.
    fn works_on(&self, worker: WorkerIdx, day: DayIdx) -> bool;

    /// Whether `worker` holds a shift on any day in `lo..=hi` other than `except`.
    fn works_between(&self, worker: WorkerIdx, lo: DayIdx, hi: DayIdx, except: DayIdx) -> bool;

    /// Number of shifts held by `worker`.
    fn shift_count(&self, worker: WorkerIdx) -> usize;
}

/// Ordered mapping from each day of the period to its slot occupants.
///
/// Slots are stored flat (`day * slots_per_day + slot`). A per-worker sorted day
/// index is kept in step so range queries around a day are O(log n).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schedule {
    start: NaiveDate,
    slots_per_day: usize,
    slots: Vec<Option<WorkerIdx>>,
    by_worker: Vec<BTreeSet<DayIdx>>,
}

impl Schedule {
    /// An empty schedule for `num_days` days and `num_workers` workers.
    pub fn empty(
        start: NaiveDate,
        num_days: usize,
        slots_per_day: usize,
        num_workers: usize,
    ) -> Self {
        Self {
            start,
            slots_per_day,
            slots: vec![None; num_days * slots_per_day],
            by_worker: vec![BTreeSet::new(); num_workers],
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn date(&self, day: DayIdx) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(day as u64))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn filled_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Fraction of required day/slot pairs that have an assigned worker.
    pub fn coverage(&self) -> f64 {
        if self.slots.is_empty() {
            1.0
        } else {
            self.filled_slots() as f64 / self.slots.len() as f64
        }
    }

    /// Occupants of one day, in slot order.
    pub fn day(&self, day: DayIdx) -> &[Option<WorkerIdx>] {
        let begin = day * self.slots_per_day;
        self.slots
            .get(begin..begin + self.slots_per_day)
            .unwrap_or(&[])
    }

    /// Put `worker` into a slot, returning the previous occupant.
    pub fn assign(&mut self, day: DayIdx, slot: usize, worker: WorkerIdx) -> Option<WorkerIdx> {
        let previous = self.clear(day, slot);
        if let Some(cell) = self.cell_mut(day, slot) {
            *cell = Some(worker);
            if let Some(days) = self.by_worker.get_mut(worker as usize) {
                days.insert(day);
            }
        }
        previous
    }

    /// Empty a slot, returning the previous occupant.
    pub fn clear(&mut self, day: DayIdx, slot: usize) -> Option<WorkerIdx> {
        let previous = self.cell_mut(day, slot).and_then(|cell| cell.take());
        if let Some(worker) = previous {
            let still_on_day = self.day(day).iter().any(|s| *s == Some(worker));
            if !still_on_day {
                if let Some(days) = self.by_worker.get_mut(worker as usize) {
                    days.remove(&day);
                }
            }
        }
        previous
    }

    fn cell_mut(&mut self, day: DayIdx, slot: usize) -> Option<&mut Option<WorkerIdx>> {
        if slot >= self.slots_per_day {
            return None;
        }
        self.slots.get_mut(day * self.slots_per_day + slot)
    }

    /// Days on which `worker` holds a shift, ascending.
    pub fn worker_days(&self, worker: WorkerIdx) -> impl Iterator<Item = DayIdx> + '_ {
        self.by_worker
            .get(worker as usize)
            .into_iter()
            .flat_map(|days| days.iter().copied())
    }

    /// Distance in days from `day` to `worker`'s nearest other shift.
    pub fn nearest_distance(&self, worker: WorkerIdx, day: DayIdx) -> Option<usize> {
        let days = self.by_worker.get(worker as usize)?;
        let before = days.range(..day).next_back().map(|&d| day - d);
        let after = days.range(day + 1..).next().map(|&d| d - day);
        match (before, after) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Slot index `worker` occupies on `day`.
    pub fn slot_of(&self, worker: WorkerIdx, day: DayIdx) -> Option<usize> {
        self.day(day).iter().position(|s| *s == Some(worker))
    }

    /// All empty (day, slot) pairs in chronological order.
    pub fn empty_slots(&self) -> Vec<(DayIdx, usize)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| (i / self.slots_per_day, i % self.slots_per_day))
            .collect()
    }

    /// Read-only, pure-data copy for reporting collaborators.
    pub fn to_snapshot(&self, model: &ConstraintModel) -> ScheduleSnapshot {
        let days = (0..self.num_days())
            .map(|day| DaySnapshot {
                date: self.date(day),
                kind: model.calendar().kind(day),
                workers: self
                    .day(day)
                    .iter()
                    .map(|s| s.map(|w| model.worker_id(w).to_string()))
                    .collect(),
            })
            .collect();
        ScheduleSnapshot {
            days,
            coverage: self.coverage(),
        }
    }
}

impl ScheduleView for Schedule {
    fn num_days(&self) -> usize {
        if self.slots_per_day == 0 {
            0
        } else {
            self.slots.len() / self.slots_per_day
        }
    }

    fn slots_per_day(&self) -> usize {
        self.slots_per_day
    }

    fn occupant(&self, day: DayIdx, slot: usize) -> Option<WorkerIdx> {
        if slot >= self.slots_per_day {
            return None;
        }
        self.slots
            .get(day * self.slots_per_day + slot)
            .copied()
            .flatten()
    }

    fn works_on(&self, worker: WorkerIdx, day: DayIdx) -> bool {
        self.by_worker
            .get(worker as usize)
            .is_some_and(|days| days.contains(&day))
    }

    fn works_between(&self, worker: WorkerIdx, lo: DayIdx, hi: DayIdx, except: DayIdx) -> bool {
        if lo > hi {
            return false;
        }
        self.by_worker
            .get(worker as usize)
            .is_some_and(|days| days.range(lo..=hi).any(|&d| d != except))
    }

    fn shift_count(&self, worker: WorkerIdx) -> usize {
        self.by_worker.get(worker as usize).map_or(0, |d| d.len())
    }
}

/// One day of a [`ScheduleSnapshot`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DaySnapshot {
    pub date: NaiveDate,
    pub kind: DayKind,
    /// Worker ID per slot; `None` for an unfilled slot.
    pub workers: Vec<Option<String>>,
}

/// Pure-data view of a schedule for report generators.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScheduleSnapshot {
    pub days: Vec<DaySnapshot>,
    pub coverage: f64,
}
