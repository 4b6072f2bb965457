//! Incremental update engine: single-slot edits on a published schedule.
//!
//! Edits move through `Clean -> Dirty -> Validated | Rejected`. Validation
//! looks only at the neighbourhood an edit can affect: the day itself, the
//! minimum-gap window, the 7/14 offsets and the incoming worker's
//! incompatibility set against the day's occupants. The published schedule is
//! shared as an `Arc` and replaced, never mutated, on commit, undo and redo.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::balance::{BalanceReport, BalanceValidator};
use crate::calendar::DayIdx;
use crate::config::OptimizerConfig;
use crate::constraints::{
    audit, is_eligible, shift_day, ConstraintModel, ConstraintViolation, HardRule, RuleContext,
    PATTERN_OFFSETS,
};
use crate::interner::WorkerIdx;
use crate::schedule::{Schedule, ScheduleSnapshot, ScheduleView};
use crate::{log_changes, log_checks};

use super::events::{ChangeEvent, ChangeKind, EventBus};
use super::history::{EditId, History, HistoryEntry, HistoryStats, SlotChange};

/// Which history stack an operation wanted to pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HistoryDirection {
    Undo,
    Redo,
}

impl fmt::Display for HistoryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryDirection::Undo => write!(f, "undo"),
            HistoryDirection::Redo => write!(f, "redo"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("{day} slot {slot}: {worker} is not eligible ({rule:?}): {reason}")]
    EligibilityViolation {
        day: NaiveDate,
        slot: usize,
        worker: String,
        rule: HardRule,
        reason: String,
    },

    #[error("Nothing to {0}")]
    EmptyHistory(HistoryDirection),

    #[error("Edit {0} is still pending; commit or roll it back first")]
    EditPending(EditId),

    #[error("Unknown edit {0}")]
    UnknownEdit(EditId),

    #[error("Edit {0} has not passed validation")]
    NotValidated(EditId),

    #[error("Unknown worker '{0}'")]
    UnknownWorker(String),

    #[error("{day} slot {slot} is outside the schedule")]
    SlotOutOfRange { day: NaiveDate, slot: usize },

    #[error("Edit {edit}: {day} slot {slot} changed hands since it was proposed")]
    OccupantChanged {
        edit: EditId,
        day: NaiveDate,
        slot: usize,
    },

    #[error("{day}: mandatory assignment of {worker} cannot be removed")]
    MandatoryRemoval { day: NaiveDate, worker: String },

    #[error("Schedule cannot be published: {count} hard-rule violations, first: {first}")]
    HardViolations { count: usize, first: String },

    #[error("Schedule shape ({days} days x {slots} slots) does not match the model")]
    ShapeMismatch { days: usize, slots: usize },
}

/// Lifecycle of the single pending edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EditState {
    Clean,
    Dirty(EditId),
    Validated(EditId),
    Rejected(EditId),
}

/// What a successful validation looked at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditCheck {
    pub edit: EditId,
    pub date: NaiveDate,
    pub slot: usize,
    pub outgoing: Option<String>,
    pub incoming: Option<String>,
    /// Dates whose assignments were consulted.
    pub checked_days: Vec<NaiveDate>,
}

/// The published schedule with the pending slot vacated.
struct PendingView<'a> {
    base: &'a Schedule,
    day: DayIdx,
    slot: usize,
    vacated: Option<WorkerIdx>,
}

impl PendingView<'_> {
    /// `worker` is the one leaving the pending slot and holds no other slot that day.
    fn leaves(&self, worker: WorkerIdx) -> bool {
        self.vacated == Some(worker)
            && !self
                .base
                .day(self.day)
                .iter()
                .enumerate()
                .any(|(s, o)| s != self.slot && *o == Some(worker))
    }
}

impl ScheduleView for PendingView<'_> {
    fn num_days(&self) -> usize {
        self.base.num_days()
    }

    fn slots_per_day(&self) -> usize {
        self.base.slots_per_day()
    }

    fn occupant(&self, day: DayIdx, slot: usize) -> Option<WorkerIdx> {
        if day == self.day && slot == self.slot {
            None
        } else {
            self.base.occupant(day, slot)
        }
    }

    fn works_on(&self, worker: WorkerIdx, day: DayIdx) -> bool {
        if day == self.day && self.leaves(worker) {
            false
        } else {
            self.base.works_on(worker, day)
        }
    }

    fn works_between(&self, worker: WorkerIdx, lo: DayIdx, hi: DayIdx, except: DayIdx) -> bool {
        if !(lo..=hi).contains(&self.day) || except == self.day || !self.leaves(worker) {
            return self.base.works_between(worker, lo, hi, except);
        }
        let before = self.day > lo && self.base.works_between(worker, lo, self.day - 1, except);
        before || self.base.works_between(worker, self.day + 1, hi, except)
    }

    fn shift_count(&self, worker: WorkerIdx) -> usize {
        let count = self.base.shift_count(worker);
        if self.leaves(worker) {
            count.saturating_sub(1)
        } else {
            count
        }
    }
}

/// Owns the published schedule and every change made to it after publication.
pub struct UpdateEngine {
    model: ConstraintModel,
    validator: BalanceValidator,
    verbosity: u8,
    current: Arc<Schedule>,
    report: BalanceReport,
    history: History,
    events: EventBus,
    state: EditState,
    pending: Option<SlotChange>,
    next_edit: u64,
    version: u64,
}

impl UpdateEngine {
    /// Freeze `schedule` as published. It must satisfy every hard rule.
    pub fn publish(
        model: ConstraintModel,
        config: &OptimizerConfig,
        schedule: Schedule,
    ) -> Result<Self, EngineError> {
        if schedule.num_days() != model.num_days()
            || schedule.slots_per_day() != model.slots_per_day()
        {
            return Err(EngineError::ShapeMismatch {
                days: schedule.num_days(),
                slots: schedule.slots_per_day(),
            });
        }
        let critical: Vec<ConstraintViolation> = audit(&model, &schedule)
            .into_iter()
            .filter(|v| v.is_critical())
            .collect();
        if let Some(first) = critical.first() {
            return Err(EngineError::HardViolations {
                count: critical.len(),
                first: first.to_string(),
            });
        }

        let validator = BalanceValidator::new(config);
        let report = validator.validate(&model, &schedule);
        if report.has_critical() {
            tracing::warn!(
                "Publishing schedule with critical balance findings (score {:.1})",
                report.score
            );
        }
        log_changes!(
            config.verbosity,
            "Published schedule: {}/{} slots filled",
            schedule.filled_slots(),
            schedule.total_slots()
        );

        Ok(Self {
            model,
            validator,
            verbosity: config.verbosity,
            current: Arc::new(schedule),
            report,
            history: History::new(config.history_depth),
            events: EventBus::new(),
            state: EditState::Clean,
            pending: None,
            next_edit: 1,
            version: 0,
        })
    }

    pub fn model(&self) -> &ConstraintModel {
        &self.model
    }

    /// The current published schedule. Never mutated after it is handed out.
    pub fn published(&self) -> Arc<Schedule> {
        Arc::clone(&self.current)
    }

    pub fn snapshot(&self) -> ScheduleSnapshot {
        self.current.to_snapshot(&self.model)
    }

    /// Balance statistics of the published schedule.
    pub fn report(&self) -> &BalanceReport {
        &self.report
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> HistoryStats {
        HistoryStats {
            undo_depth: self.history.undo_depth(),
            redo_depth: self.history.redo_depth(),
            capacity: self.history.capacity(),
            version: self.version,
        }
    }

    /// Receive one event per committed, undone or redone change.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Stage putting `worker` (or nobody) into `slot` on `date`.
    ///
    /// A rejected edit is discarded by the next proposal; a dirty or
    /// validated one must be committed or rolled back first.
    pub fn propose_edit(
        &mut self,
        date: NaiveDate,
        slot: usize,
        worker: Option<&str>,
    ) -> Result<EditId, EngineError> {
        match self.state {
            EditState::Dirty(id) | EditState::Validated(id) => {
                return Err(EngineError::EditPending(id))
            }
            EditState::Clean | EditState::Rejected(_) => {}
        }

        let day = self
            .model
            .calendar()
            .index_of(date)
            .filter(|_| slot < self.model.slots_per_day())
            .ok_or(EngineError::SlotOutOfRange { day: date, slot })?;
        let incoming = worker
            .map(|id| {
                self.model
                    .worker_idx(id)
                    .ok_or_else(|| EngineError::UnknownWorker(id.to_string()))
            })
            .transpose()?;

        let id = EditId(self.next_edit);
        self.next_edit += 1;
        self.pending = Some(SlotChange {
            id,
            day,
            slot,
            outgoing: self.current.occupant(day, slot),
            incoming,
        });
        self.state = EditState::Dirty(id);
        log_checks!(
            self.verbosity,
            "Edit {} proposed: {} slot {} -> {}",
            id,
            date,
            slot,
            worker.unwrap_or("(empty)")
        );
        Ok(id)
    }

    fn pending_change(&self, edit: EditId) -> Result<SlotChange, EngineError> {
        self.pending
            .filter(|change| change.id == edit)
            .ok_or(EngineError::UnknownEdit(edit))
    }

    /// The pending edit, provided its slot still holds the occupant it was
    /// proposed against. Otherwise the edit is rejected.
    fn current_change(&mut self, edit: EditId) -> Result<SlotChange, EngineError> {
        let change = self.pending_change(edit)?;
        if self.current.occupant(change.day, change.slot) != change.outgoing {
            self.state = EditState::Rejected(edit);
            let err = EngineError::OccupantChanged {
                edit,
                day: self.model.calendar().date(change.day),
                slot: change.slot,
            };
            log_changes!(self.verbosity, "Edit {} rejected: {}", edit, err);
            return Err(err);
        }
        Ok(change)
    }

    /// Check the staged edit against the hard rules it can affect.
    pub fn validate(&mut self, edit: EditId) -> Result<EditCheck, EngineError> {
        let change = self.current_change(edit)?;
        match self.check_change(&change) {
            Ok(check) => {
                self.state = EditState::Validated(edit);
                Ok(check)
            }
            Err(err) => {
                self.state = EditState::Rejected(edit);
                log_changes!(self.verbosity, "Edit {} rejected: {}", edit, err);
                Err(err)
            }
        }
    }

    fn check_change(&self, change: &SlotChange) -> Result<EditCheck, EngineError> {
        let model = &self.model;
        let date = model.calendar().date(change.day);

        if let Some(out) = change.outgoing {
            if change.incoming != Some(out) && model.is_mandatory(out, change.day) {
                return Err(EngineError::MandatoryRemoval {
                    day: date,
                    worker: model.worker_id(out).to_string(),
                });
            }
        }

        if let Some(worker) = change.incoming.filter(|&w| Some(w) != change.outgoing) {
            let view = PendingView {
                base: &self.current,
                day: change.day,
                slot: change.slot,
                vacated: change.outgoing,
            };
            let ctx = RuleContext::strict(model);
            if let Err(reason) = is_eligible(&ctx, worker, change.day, &view) {
                return Err(EngineError::EligibilityViolation {
                    day: date,
                    slot: change.slot,
                    worker: model.worker_id(worker).to_string(),
                    rule: reason.rule(),
                    reason: reason.describe(model),
                });
            }
        }

        Ok(EditCheck {
            edit: change.id,
            date,
            slot: change.slot,
            outgoing: change.outgoing.map(|w| model.worker_id(w).to_string()),
            incoming: change.incoming.map(|w| model.worker_id(w).to_string()),
            checked_days: self
                .neighbourhood(change.day)
                .into_iter()
                .map(|day| model.calendar().date(day))
                .collect(),
        })
    }

    /// Days an edit on `day` can interact with.
    fn neighbourhood(&self, day: DayIdx) -> Vec<DayIdx> {
        let reach = self.model.min_gap_days().saturating_sub(1) as usize;
        let mut days: Vec<DayIdx> = (day.saturating_sub(reach)..=day + reach).collect();
        days.extend(
            PATTERN_OFFSETS
                .iter()
                .filter_map(|&offset| shift_day(day, offset)),
        );
        days.retain(|&d| d < self.model.num_days());
        days.sort_unstable();
        days.dedup();
        days
    }

    /// Apply a validated edit, producing a new schedule version.
    pub fn commit(&mut self, edit: EditId) -> Result<ChangeEvent, EngineError> {
        self.pending_change(edit)?;
        if self.state != EditState::Validated(edit) {
            return Err(EngineError::NotValidated(edit));
        }
        let change = self.current_change(edit)?;

        let mut next = Schedule::clone(&self.current);
        match change.incoming {
            Some(worker) => {
                next.assign(change.day, change.slot, worker);
            }
            None => {
                next.clear(change.day, change.slot);
            }
        }
        let after = Arc::new(next);
        self.history.record(HistoryEntry {
            change,
            before: Arc::clone(&self.current),
            after: Arc::clone(&after),
        });
        self.pending = None;
        self.state = EditState::Clean;

        let event = self.apply(
            after,
            change.day,
            change.slot,
            change.outgoing,
            change.incoming,
            ChangeKind::Commit,
            &change.touched(),
        );
        log_changes!(
            self.verbosity,
            "Edit {} committed as version {}",
            edit,
            self.version
        );
        Ok(event)
    }

    /// Discard a pending edit, or undo `edit` if it is the latest commit.
    pub fn rollback(&mut self, edit: EditId) -> Result<(), EngineError> {
        if self.pending.is_some_and(|change| change.id == edit) {
            self.pending = None;
            self.state = EditState::Clean;
            log_checks!(self.verbosity, "Edit {} rolled back", edit);
            return Ok(());
        }
        let latest = self.history.last_committed().map(|entry| entry.change.id);
        if latest == Some(edit) {
            return self.undo().map(|_| ());
        }
        Err(EngineError::UnknownEdit(edit))
    }

    /// Restore the version before the latest commit.
    ///
    /// A rejected pending edit is discarded first.
    pub fn undo(&mut self) -> Result<ChangeEvent, EngineError> {
        self.settle_pending()?;
        let (change, before) = {
            let entry = self
                .history
                .undo()
                .ok_or(EngineError::EmptyHistory(HistoryDirection::Undo))?;
            (entry.change, Arc::clone(&entry.before))
        };
        Ok(self.apply(
            before,
            change.day,
            change.slot,
            change.incoming,
            change.outgoing,
            ChangeKind::Undo,
            &change.touched(),
        ))
    }

    /// Re-apply the most recently undone commit.
    ///
    /// A rejected pending edit is discarded first.
    pub fn redo(&mut self) -> Result<ChangeEvent, EngineError> {
        self.settle_pending()?;
        let (change, after) = {
            let entry = self
                .history
                .redo()
                .ok_or(EngineError::EmptyHistory(HistoryDirection::Redo))?;
            (entry.change, Arc::clone(&entry.after))
        };
        Ok(self.apply(
            after,
            change.day,
            change.slot,
            change.outgoing,
            change.incoming,
            ChangeKind::Redo,
            &change.touched(),
        ))
    }

    /// Refuse while an edit is in flight; drop a rejected one.
    fn settle_pending(&mut self) -> Result<(), EngineError> {
        match self.state {
            EditState::Dirty(id) | EditState::Validated(id) => Err(EngineError::EditPending(id)),
            EditState::Rejected(id) => {
                self.pending = None;
                self.state = EditState::Clean;
                log_checks!(self.verbosity, "Edit {} discarded", id);
                Ok(())
            }
            EditState::Clean => Ok(()),
        }
    }

    /// Swap in a new version, refresh statistics and notify subscribers.
    #[allow(clippy::too_many_arguments)]
    fn apply(
        &mut self,
        schedule: Arc<Schedule>,
        day: DayIdx,
        slot: usize,
        outgoing: Option<WorkerIdx>,
        incoming: Option<WorkerIdx>,
        kind: ChangeKind,
        touched: &[WorkerIdx],
    ) -> ChangeEvent {
        self.current = schedule;
        self.version += 1;
        let full_recompute =
            self.validator
                .refresh(&self.model, &self.current, &mut self.report, touched);
        log_checks!(
            self.verbosity,
            "Version {}: balance score {:.1} ({} recompute), {} subscribers",
            self.version,
            self.report.score,
            if full_recompute { "full" } else { "partial" },
            self.events.subscriber_count()
        );

        let event = ChangeEvent {
            version: self.version,
            kind,
            date: self.model.calendar().date(day),
            slot,
            outgoing: outgoing.map(|w| self.model.worker_id(w).to_string()),
            incoming: incoming.map(|w| self.model.worker_id(w).to_string()),
            full_recompute,
        };
        self.events.publish(event.clone());
        event
    }
}
