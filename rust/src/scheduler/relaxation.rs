//! Bounded relaxation of soft constraints to recover unfilled slots.
//!
//! Three passes, each only filling slots the previous left empty:
//! 1. transfer repair (no rule is loosened)
//! 2. target increase, capped at `max_target_increase_pct` of the configured target
//! 3. minimum-gap reduction by `gap_relaxation_days`, only for workers still
//!    `gap_relaxation_min_remaining` or more shifts short of target
//!
//! Mandatory dates, incompatibilities, days off, work periods and the 7/14-day
//! pattern are checked with the strict rules in every pass.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::OptimizerConfig;
use crate::constraints::{is_eligible, ConstraintModel, RuleContext};
use crate::interner::WorkerIdx;
use crate::log_changes;
use crate::schedule::{Schedule, ScheduleView};

use super::priority::{rank_candidates, PriorityContext};
use super::strict::fill_candidates;

/// The loosest relaxation a result needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RelaxationLevel {
    Strict,
    TargetIncrease,
    GapReduction,
}

/// A soft-constraint relaxation applied to one worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Relaxation {
    /// Effective target raised above the configured one.
    TargetIncrease {
        worker: String,
        configured: u32,
        effective: u32,
    },
    /// Shift placed closer than the configured minimum gap.
    GapReduction {
        worker: String,
        date: NaiveDate,
        configured_gap: u32,
        effective_gap: u32,
        /// Shifts still needed to reach target when the reduction was granted.
        remaining: u32,
    },
}

impl Relaxation {
    pub fn level(&self) -> RelaxationLevel {
        match self {
            Relaxation::TargetIncrease { .. } => RelaxationLevel::TargetIncrease,
            Relaxation::GapReduction { .. } => RelaxationLevel::GapReduction,
        }
    }

    pub fn worker(&self) -> &str {
        match self {
            Relaxation::TargetIncrease { worker, .. } | Relaxation::GapReduction { worker, .. } => {
                worker
            }
        }
    }
}

impl fmt::Display for Relaxation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relaxation::TargetIncrease {
                worker,
                configured,
                effective,
            } => write!(f, "{}: target {} -> {}", worker, configured, effective),
            Relaxation::GapReduction {
                worker,
                date,
                configured_gap,
                effective_gap,
                remaining,
            } => write!(
                f,
                "{}: gap {} -> {} on {} ({} shifts remaining)",
                worker, configured_gap, effective_gap, date, remaining
            ),
        }
    }
}

/// Highest effective target reachable from `target` by relaxation.
pub fn target_cap(target: u32, max_increase_pct: f64) -> u32 {
    (target as f64 * (1.0 + max_increase_pct / 100.0)).floor() as u32
}

/// Applies the relaxation passes to one candidate schedule.
pub struct Repairer<'a> {
    model: &'a ConstraintModel,
    config: &'a OptimizerConfig,
    targets: Vec<u32>,
}

/// What a repair run changed.
#[derive(Clone, Debug, Default)]
pub struct RepairSummary {
    pub transfers: usize,
    pub relaxations: Vec<Relaxation>,
}

impl<'a> Repairer<'a> {
    pub fn new(model: &'a ConstraintModel, config: &'a OptimizerConfig) -> Self {
        Self {
            model,
            config,
            targets: model.profiles().iter().map(|p| p.target).collect(),
        }
    }

    pub fn run(&self, schedule: &mut Schedule) -> RepairSummary {
        let mut summary = RepairSummary {
            transfers: self.transfer_repair(schedule),
            relaxations: Vec::new(),
        };
        self.increase_targets(schedule, &mut summary.relaxations);
        self.reduce_gaps(schedule, &mut summary.relaxations);

        if summary.transfers > 0 || !summary.relaxations.is_empty() {
            log_changes!(
                self.config.verbosity,
                "Repair: {} transfers, {} relaxations, {} slots still empty",
                summary.transfers,
                summary.relaxations.len(),
                schedule.total_slots() - schedule.filled_slots()
            );
        }
        summary
    }

    /// Fill empty slots by moving an at-target worker off one of their
    /// non-mandatory shifts and handing that shift to someone under target.
    fn transfer_repair(&self, schedule: &mut Schedule) -> usize {
        let model = self.model;
        let ctx = RuleContext::strict(model);
        let priority = PriorityContext::new(model, &self.config.priority, &self.targets);
        let mut transfers = 0;

        for (day, slot) in schedule.empty_slots() {
            let donors: Vec<WorkerIdx> = model
                .worker_indices()
                .filter(|&w| schedule.shift_count(w) as u32 >= self.targets[w as usize])
                .filter(|&w| is_eligible(&ctx, w, day, schedule).is_ok())
                .collect();

            'donors: for donor in donors {
                let days: Vec<usize> = schedule.worker_days(donor).collect();
                for from_day in days {
                    if model.is_mandatory(donor, from_day) {
                        continue;
                    }
                    let Some(from_slot) = schedule.slot_of(donor, from_day) else {
                        continue;
                    };
                    schedule.clear(from_day, from_slot);
                    let takers: Vec<WorkerIdx> =
                        fill_candidates(&ctx, schedule, from_day, &self.targets)
                            .into_iter()
                            .filter(|&w| w != donor)
                            .collect();
                    let ranked = rank_candidates(&priority, schedule, from_day, &takers, None);
                    if let Some(&taker) = ranked.first() {
                        schedule.assign(from_day, from_slot, taker);
                        schedule.assign(day, slot, donor);
                        transfers += 1;
                        break 'donors;
                    }
                    schedule.assign(from_day, from_slot, donor);
                }
            }
        }
        transfers
    }

    fn increase_targets(&self, schedule: &mut Schedule, relaxations: &mut Vec<Relaxation>) {
        if self.config.max_target_increase_pct <= 0.0 {
            return;
        }
        let model = self.model;
        let ctx = RuleContext::strict(model);
        let caps: Vec<u32> = self
            .targets
            .iter()
            .map(|&t| target_cap(t, self.config.max_target_increase_pct))
            .collect();
        let priority = PriorityContext::new(model, &self.config.priority, &self.targets);

        for (day, slot) in schedule.empty_slots() {
            let candidates = fill_candidates(&ctx, schedule, day, &caps);
            let ranked = rank_candidates(&priority, schedule, day, &candidates, None);
            let Some(&worker) = ranked.first() else {
                continue;
            };
            schedule.assign(day, slot, worker);

            let configured = self.targets[worker as usize];
            let count = schedule.shift_count(worker) as u32;
            if count > configured {
                record_target_increase(relaxations, model.worker_id(worker), configured, count);
            }
        }
    }

    fn reduce_gaps(&self, schedule: &mut Schedule, relaxations: &mut Vec<Relaxation>) {
        let configured_gap = self.model.min_gap_days();
        let relax = self.config.gap_relaxation_days.min(configured_gap.saturating_sub(1));
        if relax == 0 {
            return;
        }
        let effective_gap = configured_gap - relax;
        let model = self.model;
        let gaps = vec![effective_gap; model.num_workers()];
        let strict = RuleContext::strict(model);
        let ctx = RuleContext::with_gaps(model, &gaps);
        let priority = PriorityContext::new(model, &self.config.priority, &self.targets);
        let min_remaining = self.config.gap_relaxation_min_remaining;

        for (day, slot) in schedule.empty_slots() {
            let candidates: Vec<WorkerIdx> = model
                .worker_indices()
                .filter(|&w| self.remaining(schedule, w) >= min_remaining)
                .filter(|&w| is_eligible(&ctx, w, day, schedule).is_ok())
                .collect();
            let ranked = rank_candidates(&priority, schedule, day, &candidates, None);
            let Some(&worker) = ranked.first() else {
                continue;
            };
            let remaining = self.remaining(schedule, worker);
            let relaxed = is_eligible(&strict, worker, day, schedule)
                .is_err_and(|reason| reason.rule().is_relaxable());
            schedule.assign(day, slot, worker);
            if !relaxed {
                continue;
            }
            relaxations.push(Relaxation::GapReduction {
                worker: model.worker_id(worker).to_string(),
                date: model.calendar().date(day),
                configured_gap,
                effective_gap,
                remaining,
            });
        }
    }

    /// Shifts still needed to reach the configured target.
    fn remaining(&self, schedule: &Schedule, worker: WorkerIdx) -> u32 {
        self.targets[worker as usize].saturating_sub(schedule.shift_count(worker) as u32)
    }
}

fn record_target_increase(
    relaxations: &mut Vec<Relaxation>,
    id: &str,
    configured: u32,
    effective: u32,
) {
    for relaxation in relaxations.iter_mut() {
        if let Relaxation::TargetIncrease {
            worker,
            effective: current,
            ..
        } = relaxation
        {
            if worker == id {
                *current = (*current).max(effective);
                return;
            }
        }
    }
    relaxations.push(Relaxation::TargetIncrease {
        worker: id.to_string(),
        configured,
        effective,
    });
}
