//! Search state for the strict builder's bounded backtracking.

use std::collections::VecDeque;

use crate::interner::WorkerIdx;
use crate::schedule::Schedule;

/// A slot where more than one candidate was available.
#[derive(Clone, Debug)]
pub struct DecisionPoint {
    /// Index into the builder's position list.
    pub position: usize,
    /// Untried candidates, best last.
    alternatives: Vec<WorkerIdx>,
    /// Arena index of the schedule as it was before the decision.
    snapshot: usize,
}

/// Working schedule plus an explicit stack of decision points.
///
/// Snapshots are copied into an arena on every branch and referenced by
/// index, so restoring a decision is a copy rather than an undo replay.
/// Only the most recent `max_depth` decisions are kept.
#[derive(Clone, Debug)]
pub struct SearchState {
    schedule: Schedule,
    decisions: VecDeque<DecisionPoint>,
    arena: Vec<Schedule>,
    free: Vec<usize>,
    max_depth: usize,
}

impl SearchState {
    pub fn new(schedule: Schedule, max_depth: usize) -> Self {
        Self {
            schedule,
            decisions: VecDeque::with_capacity(max_depth),
            arena: Vec::with_capacity(max_depth),
            free: Vec::new(),
            max_depth,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    pub fn depth(&self) -> usize {
        self.decisions.len()
    }

    fn store(&mut self) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.arena[idx].clone_from(&self.schedule);
                idx
            }
            None => {
                self.arena.push(self.schedule.clone());
                self.arena.len() - 1
            }
        }
    }

    /// Record a branch at `position` before the first choice is applied.
    ///
    /// `alternatives` are the remaining candidates in preference order.
    pub fn push_decision(&mut self, position: usize, mut alternatives: Vec<WorkerIdx>) {
        if self.max_depth == 0 || alternatives.is_empty() {
            return;
        }
        if self.decisions.len() == self.max_depth {
            if let Some(oldest) = self.decisions.pop_front() {
                self.free.push(oldest.snapshot);
            }
        }
        alternatives.reverse();
        let snapshot = self.store();
        self.decisions.push_back(DecisionPoint {
            position,
            alternatives,
            snapshot,
        });
    }

    /// Return to the most recent decision and take its next alternative.
    ///
    /// Restores the schedule to its state before that decision and yields
    /// `(position, worker)`; the caller assigns the worker and resumes after
    /// the position.
    pub fn backtrack(&mut self) -> Option<(usize, WorkerIdx)> {
        let mut decision = self.decisions.pop_back()?;
        let worker = decision.alternatives.pop()?;
        self.schedule.clone_from(&self.arena[decision.snapshot]);
        let position = decision.position;
        if decision.alternatives.is_empty() {
            self.free.push(decision.snapshot);
        } else {
            self.decisions.push_back(decision);
        }
        Some((position, worker))
    }

    pub fn into_schedule(self) -> Schedule {
        self.schedule
    }
}
