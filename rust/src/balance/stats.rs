//! Per-worker load statistics.

use serde::Serialize;

use crate::calendar::DayKind;
use crate::constraints::ConstraintModel;
use crate::interner::WorkerIdx;
use crate::schedule::{Schedule, ScheduleView};

/// Schedule-wide sums the per-worker expectations are derived from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BalanceTotals {
    /// Filled slots.
    pub assigned: u32,
    /// Filled slots on weekend-class days.
    pub weekend: u32,
    /// Sum of worker load weights.
    pub total_weight: f64,
}

/// Load statistics for one worker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkerStats {
    pub worker: String,
    pub work_fraction: f64,
    pub target: u32,
    pub total: u32,
    /// Shifts on Friday/Saturday/Sunday, holidays and pre-holidays.
    pub weekend: u32,
    pub holidays: u32,
    /// Share of this worker's shifts falling on weekend-class days.
    pub weekend_pct: f64,
    /// Proportional share of all assigned shifts.
    pub expected_total: f64,
    pub expected_weekend: f64,
    pub deviation_pct: f64,
    pub weekend_deviation_pct: f64,
}

impl WorkerStats {
    /// Shifts above (positive) or below (negative) the rounded expectation.
    pub fn excess(&self) -> i64 {
        self.total as i64 - self.expected_total.round() as i64
    }
}

pub fn compute_totals(model: &ConstraintModel, schedule: &Schedule) -> BalanceTotals {
    let calendar = model.calendar();
    let mut assigned = 0;
    let mut weekend = 0;
    for day in 0..schedule.num_days() {
        let filled = schedule.day(day).iter().flatten().count() as u32;
        assigned += filled;
        if calendar.is_weekend(day) {
            weekend += filled;
        }
    }
    BalanceTotals {
        assigned,
        weekend,
        total_weight: model.total_load_weight(),
    }
}

/// Percentage deviation of `actual` from `expected` (0 when nothing is expected).
pub fn deviation_pct(actual: u32, expected: f64) -> f64 {
    if expected > 0.0 {
        (actual as f64 - expected) / expected * 100.0
    } else {
        0.0
    }
}

pub fn compute_worker_stats(
    model: &ConstraintModel,
    schedule: &Schedule,
    worker: WorkerIdx,
    totals: &BalanceTotals,
) -> WorkerStats {
    let profile = model.profile(worker);
    let calendar = model.calendar();

    let mut total = 0;
    let mut weekend = 0;
    let mut holidays = 0;
    for day in schedule.worker_days(worker) {
        total += 1;
        let kind = calendar.kind(day);
        if kind.counts_as_weekend() {
            weekend += 1;
        }
        if kind == DayKind::Holiday {
            holidays += 1;
        }
    }

    let share = if totals.total_weight > 0.0 {
        profile.load_weight() / totals.total_weight
    } else {
        0.0
    };
    let expected_total = totals.assigned as f64 * share;
    let expected_weekend = totals.weekend as f64 * share;

    WorkerStats {
        worker: profile.id.clone(),
        work_fraction: profile.work_fraction,
        target: profile.target,
        total,
        weekend,
        holidays,
        weekend_pct: if total > 0 {
            weekend as f64 / total as f64 * 100.0
        } else {
            0.0
        },
        expected_total,
        expected_weekend,
        deviation_pct: deviation_pct(total, expected_total),
        weekend_deviation_pct: deviation_pct(weekend, expected_weekend),
    }
}

fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

/// Balance score in [0, 100]; higher is fairer.
///
/// Blends workload (60%) and weekend load (40%) dispersion, each normalized by
/// worker load weight. Workers with no available days are ignored.
pub fn balance_score(model: &ConstraintModel, stats: &[WorkerStats]) -> f64 {
    let mut workload = Vec::with_capacity(stats.len());
    let mut weekend = Vec::with_capacity(stats.len());
    for (profile, s) in model.profiles().iter().zip(stats) {
        let weight = profile.load_weight();
        if weight > 0.0 {
            workload.push(s.total as f64 / weight);
            weekend.push(s.weekend as f64 / weight);
        }
    }

    let workload_score = (100.0 - 100.0 * coefficient_of_variation(&workload)).clamp(0.0, 100.0);
    let weekend_score = (100.0 - 80.0 * coefficient_of_variation(&weekend)).clamp(0.0, 100.0);
    0.6 * workload_score + 0.4 * weekend_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::models::{Period, Worker};
    use chrono::NaiveDate;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn setup() -> (ConstraintModel, Schedule) {
        // 2025-01-06 is a Monday; 2025-01-10..12 is Fri..Sun
        let period = Period::new(d(2025, 1, 6), d(2025, 1, 12), 1);
        let workers = vec![Worker::new("a"), Worker::new("b").with_fraction(0.5)];
        let model = ConstraintModel::new(&workers, &period, &OptimizerConfig::default()).unwrap();
        let schedule = Schedule::empty(period.start, 7, 1, 2);
        (model, schedule)
    }

    #[test]
    fn test_totals_and_expectations() {
        let (model, mut schedule) = setup();
        schedule.assign(0, 0, 0);
        schedule.assign(2, 0, 0);
        schedule.assign(4, 0, 0);
        schedule.assign(5, 0, 1);

        let totals = compute_totals(&model, &schedule);
        assert_eq!(totals.assigned, 4);
        assert_eq!(totals.weekend, 2);

        let a = compute_worker_stats(&model, &schedule, 0, &totals);
        assert_eq!((a.total, a.weekend), (3, 1));
        // a carries two thirds of the load weight
        assert!((a.expected_total - 8.0 / 3.0).abs() < 1e-9);
        assert!((a.weekend_pct - 100.0 / 3.0).abs() < 1e-9);

        let b = compute_worker_stats(&model, &schedule, 1, &totals);
        assert!((b.expected_total - 4.0 / 3.0).abs() < 1e-9);
        assert!(b.deviation_pct < 0.0);
        assert_eq!(b.excess(), 0);
    }

    #[test]
    fn test_score_prefers_proportional_loads() {
        let (model, mut schedule) = setup();
        schedule.assign(0, 0, 0);
        schedule.assign(2, 0, 0);
        schedule.assign(4, 0, 1);
        let totals = compute_totals(&model, &schedule);
        let stats: Vec<WorkerStats> = model
            .worker_indices()
            .map(|w| compute_worker_stats(&model, &schedule, w, &totals))
            .collect();
        let proportional = balance_score(&model, &stats);

        schedule.assign(4, 0, 0);
        let totals = compute_totals(&model, &schedule);
        let stats: Vec<WorkerStats> = model
            .worker_indices()
            .map(|w| compute_worker_stats(&model, &schedule, w, &totals))
            .collect();
        let skewed = balance_score(&model, &stats);

        assert!(proportional > skewed);
        assert!((0.0..=100.0).contains(&skewed));
    }

    #[test]
    fn test_empty_schedule_scores_full() {
        let (model, schedule) = setup();
        let totals = compute_totals(&model, &schedule);
        let stats: Vec<WorkerStats> = model
            .worker_indices()
            .map(|w| compute_worker_stats(&model, &schedule, w, &totals))
            .collect();
        assert_eq!(stats[0].deviation_pct, 0.0);
        assert!((balance_score(&model, &stats) - 100.0).abs() < 1e-9);
    }
}
