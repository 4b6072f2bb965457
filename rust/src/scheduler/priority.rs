//! Candidate prioritization for filling a slot.
//!
//! A candidate's score rewards:
//! - remaining shifts until target (absolute and relative to the target, so
//!   part-time workers are not starved)
//! - weekend deficit, on weekend-class days only
//! - distance from the worker's nearest existing shift
//!
//! Perturbed restarts add seeded jitter so independent iterations explore
//! different orders.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::Rng;

use crate::calendar::DayIdx;
use crate::config::PriorityWeights;
use crate::constraints::ConstraintModel;
use crate::interner::WorkerIdx;
use crate::schedule::{Schedule, ScheduleView};

/// Spacing bonus saturates at this many days.
const SPACING_HORIZON: f64 = 14.0;

/// Sort key for a candidate; lower sorts first.
///
/// Ties on score are broken by worker id so ordering is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateKey<'a> {
    pub neg_score: f64,
    pub worker_id: &'a str,
    pub worker: WorkerIdx,
}

/// Compare f64 values for sorting, treating NaN as equal.
fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

impl Eq for CandidateKey<'_> {}

impl Ord for CandidateKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_f64(self.neg_score, other.neg_score).then_with(|| self.worker_id.cmp(other.worker_id))
    }
}

impl PartialOrd for CandidateKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Everything the score needs besides the schedule itself.
pub struct PriorityContext<'a> {
    pub model: &'a ConstraintModel,
    pub weights: &'a PriorityWeights,
    /// Per-worker target used for "remaining" (configured or relaxed).
    pub targets: &'a [u32],
    /// Share of period days that count as weekend load.
    weekend_ratio: f64,
}

impl<'a> PriorityContext<'a> {
    pub fn new(model: &'a ConstraintModel, weights: &'a PriorityWeights, targets: &'a [u32]) -> Self {
        let days = model.num_days().max(1) as f64;
        Self {
            model,
            weights,
            targets,
            weekend_ratio: model.calendar().weekend_days() as f64 / days,
        }
    }

    fn target(&self, worker: WorkerIdx) -> u32 {
        self.targets
            .get(worker as usize)
            .copied()
            .unwrap_or_else(|| self.model.target(worker))
    }
}

fn weekend_count(model: &ConstraintModel, schedule: &Schedule, worker: WorkerIdx) -> usize {
    let calendar = model.calendar();
    schedule
        .worker_days(worker)
        .filter(|&d| calendar.is_weekend(d))
        .count()
}

/// Priority of giving `day` to `worker` (higher = more deserving).
pub fn priority_score(
    ctx: &PriorityContext<'_>,
    schedule: &Schedule,
    worker: WorkerIdx,
    day: DayIdx,
) -> f64 {
    let w = ctx.weights;
    let target = ctx.target(worker) as f64;
    let assigned = schedule.shift_count(worker) as f64;
    let remaining = target - assigned;

    let mut score = w.remaining * remaining;
    if target > 0.0 {
        score += w.remaining_ratio * remaining / target;
    }

    if ctx.model.calendar().is_weekend(day) {
        let expected = target * ctx.weekend_ratio;
        let deficit = expected - weekend_count(ctx.model, schedule, worker) as f64;
        score += w.weekend_deficit * deficit;
    }

    let spacing = schedule
        .nearest_distance(worker, day)
        .map_or(SPACING_HORIZON, |d| (d as f64).min(SPACING_HORIZON));
    score += w.spacing * spacing / SPACING_HORIZON;

    score
}

/// Order `candidates` for `day`, most deserving first.
///
/// With an `rng`, each score gets jitter in `[0, weights.jitter)`.
pub fn rank_candidates(
    ctx: &PriorityContext<'_>,
    schedule: &Schedule,
    day: DayIdx,
    candidates: &[WorkerIdx],
    mut rng: Option<&mut StdRng>,
) -> Vec<WorkerIdx> {
    let mut keys: Vec<CandidateKey<'_>> = candidates
        .iter()
        .map(|&worker| {
            let mut score = priority_score(ctx, schedule, worker, day);
            if let Some(rng) = rng.as_deref_mut() {
                score += ctx.weights.jitter * rng.random::<f64>();
            }
            CandidateKey {
                neg_score: -score,
                worker_id: ctx.model.worker_id(worker),
                worker,
            }
        })
        .collect();

    keys.sort();
    keys.into_iter().map(|k| k.worker).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::models::{Period, Worker};
    use chrono::NaiveDate;
    use rand::SeedableRng;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn model(workers: &[Worker]) -> ConstraintModel {
        let period = Period::new(d(2025, 1, 1), d(2025, 1, 28), 1);
        ConstraintModel::new(workers, &period, &OptimizerConfig::default()).unwrap()
    }

    fn targets(model: &ConstraintModel) -> Vec<u32> {
        model.profiles().iter().map(|p| p.target).collect()
    }

    #[test]
    fn test_key_ordering() {
        let a = CandidateKey {
            neg_score: -5.0,
            worker_id: "b",
            worker: 1,
        };
        let b = CandidateKey {
            neg_score: -3.0,
            worker_id: "a",
            worker: 0,
        };
        let c = CandidateKey {
            neg_score: -5.0,
            worker_id: "a",
            worker: 0,
        };
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn test_ties_break_by_id() {
        let model = model(&[Worker::new("b"), Worker::new("a")]);
        let targets = targets(&model);
        let weights = PriorityWeights::default();
        let ctx = PriorityContext::new(&model, &weights, &targets);
        let schedule = Schedule::empty(d(2025, 1, 1), 28, 1, 2);

        assert_eq!(rank_candidates(&ctx, &schedule, 0, &[0, 1], None), vec![1, 0]);
    }

    #[test]
    fn test_fewer_assigned_ranks_first() {
        let model = model(&[Worker::new("a"), Worker::new("b")]);
        let targets = targets(&model);
        let weights = PriorityWeights::default();
        let ctx = PriorityContext::new(&model, &weights, &targets);
        let mut schedule = Schedule::empty(d(2025, 1, 1), 28, 1, 2);
        schedule.assign(0, 0, 0);
        schedule.assign(3, 0, 0);

        assert_eq!(rank_candidates(&ctx, &schedule, 10, &[0, 1], None), vec![1, 0]);
        assert!(priority_score(&ctx, &schedule, 1, 10) > priority_score(&ctx, &schedule, 0, 10));
    }

    #[test]
    fn test_part_time_ratio_bonus() {
        // Same absolute remaining, but the half-time worker is further from target
        let model = model(&[Worker::new("a"), Worker::new("h").with_fraction(0.5)]);
        let weights = PriorityWeights {
            spacing: 0.0,
            weekend_deficit: 0.0,
            ..Default::default()
        };
        let targets = vec![10, 5];
        let ctx = PriorityContext::new(&model, &weights, &targets);
        let mut schedule = Schedule::empty(d(2025, 1, 1), 28, 1, 2);
        for day in [0, 3, 6, 9, 12] {
            schedule.assign(day, 0, 0);
        }
        let full = priority_score(&ctx, &schedule, 0, 20);
        let half = priority_score(&ctx, &schedule, 1, 20);
        assert!((full - (5.0 + 4.0 * 0.5)).abs() < 1e-9);
        assert!((half - (5.0 + 4.0)).abs() < 1e-9);
    }

    #[test]
    fn test_jitter_is_seeded() {
        let workers: Vec<Worker> = (0..6).map(|i| Worker::new(format!("w{}", i))).collect();
        let model = model(&workers);
        let targets = targets(&model);
        let weights = PriorityWeights::default();
        let ctx = PriorityContext::new(&model, &weights, &targets);
        let schedule = Schedule::empty(d(2025, 1, 1), 28, 1, 6);
        let all: Vec<WorkerIdx> = (0..6).collect();

        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);
        assert_eq!(
            rank_candidates(&ctx, &schedule, 0, &all, Some(&mut rng1)),
            rank_candidates(&ctx, &schedule, 0, &all, Some(&mut rng2))
        );
    }
}
