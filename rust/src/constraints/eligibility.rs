//! Eligibility evaluator: may `worker` take `day` under the hard rules?

use crate::calendar::DayIdx;
use crate::interner::WorkerIdx;
use crate::schedule::ScheduleView;

use super::rules::{BlockReason, HardRule, RuleContext};

/// Check every hard rule in priority order; the first failure wins.
///
/// Pure function of the context and the current schedule view.
pub fn is_eligible<V: ScheduleView + ?Sized>(
    ctx: &RuleContext<'_>,
    worker: WorkerIdx,
    day: DayIdx,
    view: &V,
) -> Result<(), BlockReason> {
    check_rules(ctx, &HardRule::PRIORITY_ORDER, worker, day, view)
}

/// Check a subset of rules, in the order given.
pub fn check_rules<V: ScheduleView + ?Sized>(
    ctx: &RuleContext<'_>,
    rules: &[HardRule],
    worker: WorkerIdx,
    day: DayIdx,
    view: &V,
) -> Result<(), BlockReason> {
    for rule in rules {
        rule.check(ctx, worker, day, view)?;
    }
    Ok(())
}

/// Every failing rule for `worker` on `day`, in priority order.
pub fn blocking_reasons<V: ScheduleView + ?Sized>(
    ctx: &RuleContext<'_>,
    worker: WorkerIdx,
    day: DayIdx,
    view: &V,
) -> Vec<BlockReason> {
    HardRule::PRIORITY_ORDER
        .iter()
        .filter_map(|rule| rule.check(ctx, worker, day, view).err())
        .collect()
}
