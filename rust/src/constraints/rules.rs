//! Hard rules as tagged variants with a uniform check.

use serde::Serialize;

use crate::calendar::DayIdx;
use crate::interner::WorkerIdx;
use crate::schedule::ScheduleView;

use super::model::ConstraintModel;

/// Offsets (in days) forbidden by the 7/14-day pattern.
pub const PATTERN_OFFSETS: [i64; 4] = [-14, -7, 7, 14];

/// A hard eligibility rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum HardRule {
    WorkPeriod,
    DayOff,
    DoubleBooking,
    Incompatibility,
    MinimumGap,
    WeeklyPattern,
}

impl HardRule {
    /// Evaluation order; the first failing rule is reported.
    pub const PRIORITY_ORDER: [HardRule; 6] = [
        HardRule::WorkPeriod,
        HardRule::DayOff,
        HardRule::DoubleBooking,
        HardRule::Incompatibility,
        HardRule::MinimumGap,
        HardRule::WeeklyPattern,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HardRule::WorkPeriod => "work_period",
            HardRule::DayOff => "day_off",
            HardRule::DoubleBooking => "double_booking",
            HardRule::Incompatibility => "incompatibility",
            HardRule::MinimumGap => "minimum_gap",
            HardRule::WeeklyPattern => "weekly_pattern",
        }
    }

    /// Only the minimum gap may be loosened by the optimizer.
    pub fn is_relaxable(self) -> bool {
        matches!(self, HardRule::MinimumGap)
    }

    /// Check this rule for placing `worker` on `day` against `view`.
    pub fn check<V: ScheduleView + ?Sized>(
        self,
        ctx: &RuleContext<'_>,
        worker: WorkerIdx,
        day: DayIdx,
        view: &V,
    ) -> Result<(), BlockReason> {
        let profile = ctx.model.profile(worker);
        match self {
            HardRule::WorkPeriod => {
                let date = ctx.model.calendar().date(day);
                if profile.availability.in_work_period(date) {
                    Ok(())
                } else {
                    Err(BlockReason::OutsideWorkPeriod)
                }
            }
            HardRule::DayOff => {
                let date = ctx.model.calendar().date(day);
                if profile.availability.is_day_off(date) {
                    Err(BlockReason::DayOff)
                } else {
                    Ok(())
                }
            }
            HardRule::DoubleBooking => {
                if view.works_on(worker, day) {
                    Err(BlockReason::AlreadyAssigned)
                } else {
                    Ok(())
                }
            }
            HardRule::Incompatibility => {
                for slot in 0..view.slots_per_day() {
                    if let Some(other) = view.occupant(day, slot) {
                        if other != worker && profile.incompatible.contains(&other) {
                            return Err(BlockReason::Incompatible { other });
                        }
                    }
                }
                Ok(())
            }
            HardRule::MinimumGap => {
                let gap = ctx.min_gap(worker);
                if gap <= 1 {
                    return Ok(());
                }
                let reach = (gap - 1) as usize;
                let lo = day.saturating_sub(reach);
                let hi = day + reach;
                if view.works_between(worker, lo, hi, day) {
                    Err(BlockReason::MinimumGap { required: gap })
                } else {
                    Ok(())
                }
            }
            HardRule::WeeklyPattern => {
                for offset in PATTERN_OFFSETS {
                    let Some(other) = shift_day(day, offset) else {
                        continue;
                    };
                    if other < view.num_days() && view.works_on(worker, other) {
                        return Err(BlockReason::WeeklyPattern { offset });
                    }
                }
                Ok(())
            }
        }
    }
}

/// `day + offset`, if non-negative.
pub(crate) fn shift_day(day: DayIdx, offset: i64) -> Option<DayIdx> {
    let shifted = day as i64 + offset;
    if shifted < 0 {
        None
    } else {
        Some(shifted as DayIdx)
    }
}

/// Why a worker cannot take a given day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BlockReason {
    OutsideWorkPeriod,
    DayOff,
    AlreadyAssigned,
    Incompatible { other: WorkerIdx },
    /// Another shift lies closer than `required` days.
    MinimumGap { required: u32 },
    /// Same worker already on `day + offset`.
    WeeklyPattern { offset: i64 },
}

impl BlockReason {
    pub fn rule(self) -> HardRule {
        match self {
            BlockReason::OutsideWorkPeriod => HardRule::WorkPeriod,
            BlockReason::DayOff => HardRule::DayOff,
            BlockReason::AlreadyAssigned => HardRule::DoubleBooking,
            BlockReason::Incompatible { .. } => HardRule::Incompatibility,
            BlockReason::MinimumGap { .. } => HardRule::MinimumGap,
            BlockReason::WeeklyPattern { .. } => HardRule::WeeklyPattern,
        }
    }

    /// Human-readable reason, resolving worker indices to ids.
    pub fn describe(self, model: &ConstraintModel) -> String {
        match self {
            BlockReason::OutsideWorkPeriod => "outside work period".to_string(),
            BlockReason::DayOff => "forced day off".to_string(),
            BlockReason::AlreadyAssigned => "already assigned that day".to_string(),
            BlockReason::Incompatible { other } => {
                format!("incompatible with {}", model.worker_id(other))
            }
            BlockReason::MinimumGap { required } => {
                format!("another shift within {} days", required)
            }
            BlockReason::WeeklyPattern { offset } => {
                format!("already assigned {} days {}", offset.abs(), if offset < 0 { "before" } else { "after" })
            }
        }
    }
}

/// Inputs shared by every rule check.
///
/// `gaps` carries per-worker effective minimum gaps when the optimizer has
/// reduced some of them; otherwise the configured gap applies to everyone.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    pub model: &'a ConstraintModel,
    gaps: Option<&'a [u32]>,
}

impl<'a> RuleContext<'a> {
    pub fn strict(model: &'a ConstraintModel) -> Self {
        Self { model, gaps: None }
    }

    pub fn with_gaps(model: &'a ConstraintModel, gaps: &'a [u32]) -> Self {
        Self {
            model,
            gaps: Some(gaps),
        }
    }

    /// Effective minimum gap for `worker`.
    pub fn min_gap(&self, worker: WorkerIdx) -> u32 {
        self.gaps
            .and_then(|g| g.get(worker as usize).copied())
            .unwrap_or_else(|| self.model.min_gap_days())
    }
}
