//! Properties every optimized roster must satisfy.

use chrono::NaiveDate;
use guardia::constraints::has_critical;
use guardia::scheduler::target_cap;
use guardia::{
    audit, optimize_roster, BalanceValidator, CancellationToken, ConstraintModel,
    IterativeOptimizer, OptimizerConfig, Period, Relaxation, RosterInput, ScheduleView,
    StopReason, StrictBuilder, Worker,
};

fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn team(n: usize) -> Vec<Worker> {
    (0..n).map(|i| Worker::new(format!("w{:02}", i))).collect()
}

/// A spread of inputs from comfortable to infeasible.
fn inputs() -> Vec<RosterInput> {
    let config = OptimizerConfig {
        iteration_budget: Some(6),
        ..Default::default()
    };

    let mut mixed = team(6);
    mixed[0] = Worker::new("w00")
        .incompatible_with("w01")
        .with_mandatory(d(2025, 1, 8));
    mixed[1] = Worker::new("w01")
        .incompatible_with("w00")
        .with_fraction(0.6);
    mixed[2] = Worker::new("w02").with_day_off(d(2025, 1, 15));

    vec![
        RosterInput {
            workers: team(4),
            period: Period::new(d(2025, 1, 1), d(2025, 1, 28), 1),
            optimizer: config.clone(),
        },
        RosterInput {
            workers: mixed,
            period: Period::new(d(2025, 1, 1), d(2025, 1, 31), 2)
                .with_holidays([d(2025, 1, 1), d(2025, 1, 20)]),
            optimizer: config.clone(),
        },
        // Three workers cannot cover two slots a day under the gap and
        // 7/14 rules: relaxation must give up without breaking hard rules.
        RosterInput {
            workers: team(3),
            period: Period::new(d(2025, 1, 1), d(2025, 1, 28), 2),
            optimizer: config,
        },
    ]
}

#[test]
fn test_published_schedules_keep_hard_rules() {
    for input in inputs() {
        let roster = optimize_roster(&input).unwrap();
        let model = &roster.model;
        let schedule = &roster.outcome.schedule;
        assert!(!has_critical(&audit(model, schedule)));

        for day in 0..schedule.num_days() {
            let occupants: Vec<_> = schedule.day(day).iter().flatten().collect();
            for (i, a) in occupants.iter().enumerate() {
                for b in &occupants[i + 1..] {
                    assert_ne!(a, b);
                    assert!(!model.are_incompatible(**a, **b));
                }
            }
        }

        for w in model.worker_indices() {
            for &day in &model.profile(w).mandatory {
                assert!(schedule.works_on(w, day));
            }
            let days: Vec<usize> = schedule.worker_days(w).collect();
            for &day in &days {
                for offset in [7, 14] {
                    assert!(!days.contains(&(day + offset)));
                }
            }
        }
    }
}

#[test]
fn test_relaxation_stays_within_bounds() {
    for input in inputs() {
        let roster = optimize_roster(&input).unwrap();
        let model = &roster.model;
        let config = &input.optimizer;

        for w in model.worker_indices() {
            let cap = target_cap(model.target(w), config.max_target_increase_pct);
            assert!(roster.outcome.schedule.shift_count(w) as u32 <= cap);
        }
        for relaxation in &roster.outcome.relaxations {
            match relaxation {
                Relaxation::TargetIncrease {
                    worker,
                    configured,
                    effective,
                } => {
                    let idx = model.worker_idx(worker).unwrap();
                    assert_eq!(*configured, model.target(idx));
                    assert!(*effective > *configured);
                    assert!(*effective <= target_cap(*configured, 10.0));
                }
                Relaxation::GapReduction {
                    configured_gap,
                    effective_gap,
                    remaining,
                    ..
                } => {
                    assert!(*remaining >= 3);
                    assert!(*effective_gap + 1 >= *configured_gap);
                    assert!(*effective_gap >= 1);
                }
            }
        }
    }
}

#[test]
fn test_optimizer_never_loses_strict_coverage() {
    for input in inputs() {
        let model = ConstraintModel::new(&input.workers, &input.period, &input.optimizer).unwrap();
        let strict = StrictBuilder::new(&model, &input.optimizer).build();
        let outcome = IterativeOptimizer::new(&model, &input.optimizer).optimize(None);

        assert_eq!(outcome.strict_coverage, strict.coverage());
        assert!(outcome.coverage >= strict.coverage());
        assert_eq!(outcome.is_complete(), outcome.exhausted.is_none());
    }
}

#[test]
fn test_infeasible_input_reports_exhaustion() {
    let input = inputs().pop().unwrap();
    let roster = optimize_roster(&input).unwrap();
    let exhausted = roster.outcome.exhausted.as_ref().unwrap();

    assert!(exhausted.coverage < 1.0);
    assert_eq!(exhausted.unfilled.len(), roster.outcome.unfilled.len());
    for gap in &exhausted.unfilled {
        assert!(input.period.contains(gap.date));
        assert_eq!(gap.blocking.len(), 3);
    }
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let input = inputs().swap_remove(1);
    let model = ConstraintModel::new(&input.workers, &input.period, &input.optimizer).unwrap();
    let sequential = OptimizerConfig {
        parallel: false,
        ..input.optimizer.clone()
    };

    let a = IterativeOptimizer::new(&model, &input.optimizer).optimize(None);
    let b = IterativeOptimizer::new(&model, &sequential).optimize(None);
    assert_eq!(a.schedule, b.schedule);
    assert_eq!(a.best_iteration, b.best_iteration);
    assert_eq!(a.relaxations, b.relaxations);
}

#[test]
fn test_cancelled_run_keeps_strict_baseline() {
    let input = inputs().pop().unwrap();
    let model = ConstraintModel::new(&input.workers, &input.period, &input.optimizer).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let outcome = IterativeOptimizer::new(&model, &input.optimizer).optimize(Some(&token));
    assert_eq!(outcome.stop_reason, StopReason::Cancelled);
    assert_eq!(outcome.iterations_run, 0);
    assert_eq!(outcome.best_iteration, 0);
    assert_eq!(outcome.coverage, outcome.strict_coverage);
}

#[test]
fn test_balance_validation_is_idempotent() {
    for input in inputs() {
        let roster = optimize_roster(&input).unwrap();
        let validator = BalanceValidator::new(&input.optimizer);
        let first = validator.validate(&roster.model, &roster.outcome.schedule);
        let second = validator.validate(&roster.model, &roster.outcome.schedule);
        assert_eq!(first, second);
        assert_eq!(first, roster.outcome.balance);
    }
}
