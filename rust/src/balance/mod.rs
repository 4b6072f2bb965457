//! Balance validator: proportional fairness audit of any schedule.
//!
//! Works on schedules from any source (builder, optimizer, manual edits) and
//! never mutates them. Statistics are derived from the schedule alone, so
//! validating an unchanged schedule twice yields identical reports.

mod stats;

use std::cmp::Ordering;

use serde::Serialize;

use crate::calendar::DayIdx;
use crate::config::OptimizerConfig;
use crate::constraints::{ConstraintModel, ConstraintViolation, Severity, ViolationKind};
use crate::interner::WorkerIdx;
use crate::log_checks;
use crate::schedule::Schedule;

pub use stats::{
    balance_score, compute_totals, compute_worker_stats, deviation_pct, BalanceTotals, WorkerStats,
};

/// Suggested move of shifts from an overloaded to an underloaded worker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransferRecommendation {
    pub from: String,
    pub to: String,
    pub shifts: u32,
    /// Sum of both workers' absolute deviation in percent.
    pub combined_deviation_pct: f64,
}

/// Output of [`BalanceValidator::validate`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BalanceReport {
    /// One row per worker, in configuration order.
    pub stats: Vec<WorkerStats>,
    /// Deviation violations, consecutive-day advisories and unfilled slots.
    pub violations: Vec<ConstraintViolation>,
    pub score: f64,
    pub totals: BalanceTotals,
    #[serde(skip)]
    per_worker: Vec<Vec<ConstraintViolation>>,
    #[serde(skip)]
    unfilled: Vec<ConstraintViolation>,
}

impl BalanceReport {
    pub fn stats_for(&self, worker: &str) -> Option<&WorkerStats> {
        self.stats.iter().find(|s| s.worker == worker)
    }

    /// No worker's total or weekend load is outside the tolerance band.
    pub fn is_balanced(&self) -> bool {
        !self.violations.iter().any(|v| {
            matches!(
                v.kind,
                ViolationKind::TotalDeviation { .. } | ViolationKind::WeekendDeviation { .. }
            )
        })
    }

    pub fn has_critical(&self) -> bool {
        self.violations.iter().any(|v| v.severity == Severity::Critical)
    }

    pub fn advisories(&self) -> impl Iterator<Item = &ConstraintViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Advisory)
    }

    /// Pair overloaded with underloaded workers, largest imbalance first.
    pub fn recommendations(&self) -> Vec<TransferRecommendation> {
        let mut over: Vec<(&WorkerStats, i64)> = self
            .stats
            .iter()
            .filter_map(|s| (s.excess() > 0).then(|| (s, s.excess())))
            .collect();
        let mut under: Vec<(&WorkerStats, i64)> = self
            .stats
            .iter()
            .filter_map(|s| (s.excess() < 0).then(|| (s, -s.excess())))
            .collect();
        let by_need = |a: &(&WorkerStats, i64), b: &(&WorkerStats, i64)| {
            b.1.cmp(&a.1).then_with(|| a.0.worker.cmp(&b.0.worker))
        };
        over.sort_by(by_need);
        under.sort_by(by_need);

        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < over.len() && j < under.len() {
            let shifts = over[i].1.min(under[j].1);
            out.push(TransferRecommendation {
                from: over[i].0.worker.clone(),
                to: under[j].0.worker.clone(),
                shifts: shifts as u32,
                combined_deviation_pct: over[i].0.deviation_pct.abs()
                    + under[j].0.deviation_pct.abs(),
            });
            over[i].1 -= shifts;
            under[j].1 -= shifts;
            if over[i].1 == 0 {
                i += 1;
            }
            if under[j].1 == 0 {
                j += 1;
            }
        }

        out.sort_by(|a, b| {
            b.combined_deviation_pct
                .partial_cmp(&a.combined_deviation_pct)
                .unwrap_or(Ordering::Equal)
        });
        out
    }

    fn collect_violations(&mut self) {
        self.violations = self
            .per_worker
            .iter()
            .flatten()
            .chain(self.unfilled.iter())
            .cloned()
            .collect();
    }
}

/// Scores and audits schedules for proportional fairness.
#[derive(Clone, Debug)]
pub struct BalanceValidator {
    tolerance_pct: f64,
    emergency_tolerance_pct: f64,
    verbosity: u8,
}

impl BalanceValidator {
    pub fn new(config: &OptimizerConfig) -> Self {
        Self {
            tolerance_pct: config.tolerance_pct,
            emergency_tolerance_pct: config.emergency_tolerance_pct,
            verbosity: config.verbosity,
        }
    }

    /// Full validation of `schedule`.
    pub fn validate(&self, model: &ConstraintModel, schedule: &Schedule) -> BalanceReport {
        let totals = compute_totals(model, schedule);
        let stats: Vec<WorkerStats> = model
            .worker_indices()
            .map(|w| compute_worker_stats(model, schedule, w, &totals))
            .collect();
        let per_worker = model
            .worker_indices()
            .map(|w| self.worker_findings(model, schedule, w, &stats[w as usize]))
            .collect();
        let unfilled = schedule
            .empty_slots()
            .into_iter()
            .map(|(day, slot)| {
                ConstraintViolation::new(
                    ViolationKind::UnfilledSlot { slot },
                    Some(model.calendar().date(day)),
                    Vec::new(),
                    Severity::Warning,
                )
            })
            .collect();

        let mut report = BalanceReport {
            score: balance_score(model, &stats),
            stats,
            violations: Vec::new(),
            totals,
            per_worker,
            unfilled,
        };
        report.collect_violations();

        log_checks!(
            self.verbosity,
            "Balance: score {:.1}, {} findings, {} assigned",
            report.score,
            report.violations.len(),
            report.totals.assigned
        );
        report
    }

    /// Refresh `report` after an edit touching `workers`.
    ///
    /// Totals are carried forward from the touched workers' old and new
    /// counts. When they change every expectation shifts and the whole report
    /// is rebuilt; otherwise only the touched workers are recomputed. Returns
    /// whether a full recompute happened.
    pub fn refresh(
        &self,
        model: &ConstraintModel,
        schedule: &Schedule,
        report: &mut BalanceReport,
        workers: &[WorkerIdx],
    ) -> bool {
        if report.stats.len() != model.num_workers() {
            *report = self.validate(model, schedule);
            return true;
        }

        let mut workers = workers.to_vec();
        workers.sort_unstable();
        workers.dedup();
        let fresh: Vec<WorkerStats> = workers
            .iter()
            .map(|&w| compute_worker_stats(model, schedule, w, &report.totals))
            .collect();

        let mut totals = report.totals;
        for (&w, stats) in workers.iter().zip(&fresh) {
            let old = &report.stats[w as usize];
            totals.assigned = totals.assigned + stats.total - old.total;
            totals.weekend = totals.weekend + stats.weekend - old.weekend;
        }
        if totals != report.totals {
            *report = self.validate(model, schedule);
            return true;
        }

        for (&w, stats) in workers.iter().zip(fresh) {
            report.per_worker[w as usize] = self.worker_findings(model, schedule, w, &stats);
            report.stats[w as usize] = stats;
        }
        report.score = balance_score(model, &report.stats);
        report.collect_violations();
        false
    }

    fn worker_findings(
        &self,
        model: &ConstraintModel,
        schedule: &Schedule,
        worker: WorkerIdx,
        stats: &WorkerStats,
    ) -> Vec<ConstraintViolation> {
        let mut found = Vec::new();

        if let Some(severity) = self.deviation_severity(stats.total, stats.expected_total) {
            found.push(ConstraintViolation::new(
                ViolationKind::TotalDeviation {
                    assigned: stats.total,
                    expected: stats.expected_total,
                    deviation_pct: stats.deviation_pct,
                },
                None,
                vec![stats.worker.clone()],
                severity,
            ));
        }
        if let Some(severity) = self.deviation_severity(stats.weekend, stats.expected_weekend) {
            found.push(ConstraintViolation::new(
                ViolationKind::WeekendDeviation {
                    assigned: stats.weekend,
                    expected: stats.expected_weekend,
                    deviation_pct: stats.weekend_deviation_pct,
                },
                None,
                vec![stats.worker.clone()],
                severity,
            ));
        }

        let days: Vec<DayIdx> = schedule.worker_days(worker).collect();
        for pair in days.windows(2) {
            if pair[1] == pair[0] + 1 {
                let calendar = model.calendar();
                found.push(ConstraintViolation::new(
                    ViolationKind::ConsecutiveDays {
                        next: calendar.date(pair[1]),
                    },
                    Some(calendar.date(pair[0])),
                    vec![stats.worker.clone()],
                    Severity::Advisory,
                ));
            }
        }

        found
    }

    /// Severity of `actual` against `expected`, or `None` within tolerance.
    ///
    /// Bands are widened to whole shifts: an assignment count is only flagged
    /// when it lies outside `[floor(expected - band), ceil(expected + band)]`.
    pub fn deviation_severity(&self, actual: u32, expected: f64) -> Option<Severity> {
        let within = |pct: f64| {
            let band = expected * pct / 100.0;
            let lo = (expected - band).floor();
            let hi = (expected + band).ceil();
            (lo..=hi).contains(&(actual as f64))
        };
        if within(self.tolerance_pct) {
            None
        } else if within(self.emergency_tolerance_pct) {
            Some(Severity::Warning)
        } else {
            Some(Severity::Critical)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Period, Worker};
    use chrono::NaiveDate;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn model(n: usize, days: u32) -> ConstraintModel {
        let workers: Vec<Worker> = (0..n).map(|i| Worker::new(format!("w{}", i))).collect();
        let period = Period::new(d(2025, 1, 1), d(2025, 1, days), 1);
        ConstraintModel::new(&workers, &period, &OptimizerConfig::default()).unwrap()
    }

    fn round_robin(model: &ConstraintModel) -> Schedule {
        let n = model.num_workers();
        let mut schedule = Schedule::empty(d(2025, 1, 1), model.num_days(), 1, n);
        for day in 0..model.num_days() {
            schedule.assign(day, 0, (day % n) as WorkerIdx);
        }
        schedule
    }

    #[test]
    fn test_deviation_bands() {
        let validator = BalanceValidator::new(&OptimizerConfig::default());
        // expected 20: tolerance band [18, 22], emergency band [17, 23]
        assert_eq!(validator.deviation_severity(20, 20.0), None);
        assert_eq!(validator.deviation_severity(22, 20.0), None);
        assert_eq!(validator.deviation_severity(23, 20.0), Some(Severity::Warning));
        assert_eq!(validator.deviation_severity(25, 20.0), Some(Severity::Critical));
        // small expectations round outward to whole shifts
        assert_eq!(validator.deviation_severity(2, 1.5), None);
        assert_eq!(validator.deviation_severity(1, 1.5), None);
        assert_eq!(validator.deviation_severity(0, 0.0), None);
    }

    #[test]
    fn test_round_robin_is_balanced() {
        let model = model(4, 28);
        let schedule = round_robin(&model);
        let validator = BalanceValidator::new(&OptimizerConfig::default());
        let report = validator.validate(&model, &schedule);

        assert!(report.is_balanced());
        assert!(!report.has_critical());
        assert!(report.stats.iter().all(|s| s.total == 7));
        assert!(report.recommendations().is_empty());
        assert_eq!(report.advisories().count(), 0);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let model = model(3, 20);
        let schedule = round_robin(&model);
        let validator = BalanceValidator::new(&OptimizerConfig::default());
        assert_eq!(
            validator.validate(&model, &schedule),
            validator.validate(&model, &schedule)
        );
    }

    #[test]
    fn test_imbalance_and_recommendations() {
        let model = model(2, 10);
        let mut schedule = Schedule::empty(d(2025, 1, 1), 10, 1, 2);
        for day in 0..8 {
            schedule.assign(day, 0, 0);
        }
        schedule.assign(8, 0, 1);
        schedule.assign(9, 0, 1);

        let validator = BalanceValidator::new(&OptimizerConfig::default());
        let report = validator.validate(&model, &schedule);
        assert!(!report.is_balanced());
        assert!(report.has_critical());
        // Seven adjacent pairs for w0, one for w1
        assert_eq!(report.advisories().count(), 8);

        let recs = report.recommendations();
        assert_eq!(recs.len(), 1);
        assert_eq!((recs[0].from.as_str(), recs[0].to.as_str()), ("w0", "w1"));
        assert_eq!(recs[0].shifts, 3);
    }

    #[test]
    fn test_unfilled_slots_are_reported() {
        let model = model(2, 4);
        let mut schedule = Schedule::empty(d(2025, 1, 1), 4, 1, 2);
        schedule.assign(0, 0, 0);
        schedule.assign(2, 0, 1);
        let report = BalanceValidator::new(&OptimizerConfig::default()).validate(&model, &schedule);
        let unfilled: Vec<_> = report
            .violations
            .iter()
            .filter(|v| matches!(v.kind, ViolationKind::UnfilledSlot { .. }))
            .collect();
        assert_eq!(unfilled.len(), 2);
        assert_eq!(unfilled[0].day, Some(d(2025, 1, 2)));
    }

    #[test]
    fn test_refresh_matches_full_validation() {
        let model = model(3, 21);
        let mut schedule = round_robin(&model);
        let validator = BalanceValidator::new(&OptimizerConfig::default());
        let mut report = validator.validate(&model, &schedule);

        // Swap the occupant of one day: totals unchanged, partial refresh
        schedule.assign(4, 0, 2);
        let full = validator.refresh(&model, &schedule, &mut report, &[1, 2]);
        assert!(!full);
        assert_eq!(report, validator.validate(&model, &schedule));

        // Clearing a slot changes totals and forces a full recompute
        schedule.clear(5, 0);
        assert!(validator.refresh(&model, &schedule, &mut report, &[2]));
        assert_eq!(report, validator.validate(&model, &schedule));
    }

    #[test]
    fn test_refresh_carries_totals_forward() {
        let model = model(3, 21);
        let mut schedule = round_robin(&model);
        let validator = BalanceValidator::new(&OptimizerConfig::default());
        let mut report = validator.validate(&model, &schedule);
        let before = report.totals;

        // Jan 4 is a Saturday: one weekend shift moves from w0 to w1
        let previous = schedule.assign(3, 0, 1);
        assert_eq!(previous, Some(0));
        assert!(!validator.refresh(&model, &schedule, &mut report, &[0, 1, 1]));
        assert_eq!(report.totals, before);
        assert_eq!(report, validator.validate(&model, &schedule));

        // Emptying a weekend slot lowers both totals
        schedule.clear(4, 0);
        assert!(validator.refresh(&model, &schedule, &mut report, &[1]));
        assert_eq!(report.totals.assigned, before.assigned - 1);
        assert_eq!(report.totals.weekend, before.weekend - 1);
        assert_eq!(report, validator.validate(&model, &schedule));
    }
}
