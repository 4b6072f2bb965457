//! End-to-end rostering scenarios through the public API.

use chrono::NaiveDate;
use guardia::{
    audit, optimize_roster, ChangeKind, EditState, EngineError, HardRule, OptimizerConfig, Period,
    RosterInput, ScheduleView, ViolationKind, Worker,
};

fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn config() -> OptimizerConfig {
    OptimizerConfig {
        iteration_budget: Some(8),
        ..Default::default()
    }
}

#[test]
fn test_mandatory_date_with_incompatible_pair() {
    let input = RosterInput {
        workers: vec![
            Worker::new("a")
                .with_mandatory(d(2025, 1, 3))
                .incompatible_with("b"),
            Worker::new("b").incompatible_with("a"),
            Worker::new("c"),
            Worker::new("e"),
        ],
        period: Period::new(d(2025, 1, 1), d(2025, 1, 7), 1),
        optimizer: config(),
    };
    let roster = optimize_roster(&input).unwrap();
    let model = &roster.model;
    let schedule = &roster.outcome.schedule;
    let a = model.worker_idx("a").unwrap();
    let b = model.worker_idx("b").unwrap();

    assert_eq!(schedule.occupant(2, 0), Some(a));
    assert!(!schedule.works_on(b, 2));
    assert!(audit(model, schedule).iter().all(|v| !v.is_critical()));
    assert!(roster.outcome.coverage >= roster.outcome.strict_coverage);
}

#[test]
fn test_part_time_worker_gets_proportional_load() {
    let mut workers: Vec<Worker> = (0..4).map(|i| Worker::new(format!("full{}", i))).collect();
    workers.push(Worker::new("part").with_fraction(0.5));
    let input = RosterInput {
        workers,
        period: Period::new(d(2025, 1, 1), d(2025, 1, 30), 1),
        optimizer: OptimizerConfig {
            iteration_budget: Some(24),
            ..Default::default()
        },
    };
    let roster = optimize_roster(&input).unwrap();
    let report = &roster.outcome.balance;

    // 30 shifts over a total weight of 4.5: part expects 3.3, full-timers 6.7
    let part = report.stats_for("part").unwrap();
    assert!((3..=4).contains(&part.total), "part-timer got {}", part.total);
    assert!(
        !report.violations.iter().any(|v| {
            matches!(v.kind, ViolationKind::TotalDeviation { .. })
                && v.workers.iter().any(|w| w == "part")
        }),
        "{:?}",
        report.violations
    );
    assert!(report.is_balanced(), "{:?}", report.stats);
    assert!(audit(&roster.model, &roster.outcome.schedule)
        .iter()
        .all(|v| !v.is_critical()));
}

fn two_slot_roster() -> guardia::Roster {
    let input = RosterInput {
        workers: vec![
            Worker::new("a").incompatible_with("b"),
            Worker::new("b").incompatible_with("a"),
            Worker::new("c"),
            Worker::new("e"),
            Worker::new("f"),
            Worker::new("g"),
            Worker::new("h"),
            Worker::new("i"),
        ],
        period: Period::new(d(2025, 1, 1), d(2025, 1, 21), 2),
        optimizer: config(),
    };
    optimize_roster(&input).unwrap()
}

#[test]
fn test_incompatible_edit_is_rejected() {
    let roster = two_slot_roster();
    let a = roster.model.worker_idx("a").unwrap();
    let day = roster
        .outcome
        .schedule
        .worker_days(a)
        .next()
        .expect("a is rostered");
    let a_slot = roster.outcome.schedule.slot_of(a, day).unwrap();
    let other_slot = 1 - a_slot;
    let date = roster.model.calendar().date(day);

    let mut engine = roster.publish().unwrap();
    let before = engine.published();

    let edit = engine.propose_edit(date, other_slot, Some("b")).unwrap();
    match engine.validate(edit) {
        Err(EngineError::EligibilityViolation { day, worker, rule, .. }) => {
            assert_eq!(day, date);
            assert_eq!(worker, "b");
            assert_eq!(rule, HardRule::Incompatibility);
        }
        other => panic!("expected an eligibility violation, got {:?}", other),
    }
    assert_eq!(engine.state(), EditState::Rejected(edit));
    assert_eq!(*engine.published(), *before);
    assert_eq!(engine.history().undo_depth, 0);
}

#[test]
fn test_commit_undo_redo_round_trip() {
    let roster = two_slot_roster();
    let mut engine = roster.publish().unwrap();
    let mut events = engine.subscribe();
    let original = engine.published();
    let original_snapshot = engine.snapshot();

    let (day, slot) = (0..original.num_days())
        .flat_map(|day| (0..2).map(move |slot| (day, slot)))
        .find(|&(day, slot)| original.occupant(day, slot).is_some())
        .expect("roster has assignments");
    let date = engine.model().calendar().date(day);

    let edit = engine.propose_edit(date, slot, None).unwrap();
    engine.validate(edit).unwrap();
    let committed_event = engine.commit(edit).unwrap();
    let committed = engine.published();
    let committed_stats = engine.report().stats.clone();
    assert!(committed.occupant(day, slot).is_none());
    assert!(committed_event.full_recompute);
    assert!(committed_event.incoming.is_none());

    engine.undo().unwrap();
    assert_eq!(*engine.published(), *original);
    assert_eq!(engine.snapshot(), original_snapshot);

    engine.redo().unwrap();
    assert_eq!(*engine.published(), *committed);
    assert_eq!(engine.report().stats, committed_stats);

    let kinds: Vec<ChangeKind> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds, vec![ChangeKind::Commit, ChangeKind::Undo, ChangeKind::Redo]);
    assert_eq!(engine.history().version, 3);
}

#[test]
fn test_roster_from_json() {
    let json = r#"{
        "workers": [
            {"id": "ana", "mandatory_dates": ["2025-01-06"]},
            {"id": "ben", "work_fraction": 0.5, "incompatible_with": ["cai"]},
            {"id": "cai", "incompatible_with": ["ben"],
             "days_off": [{"start": "2025-01-10", "end": "2025-01-12"}]},
            {"id": "dee", "work_periods": [{"start": "2025-01-01", "end": "2025-01-15"}]},
            {"id": "eli", "target_shifts": 5}
        ],
        "period": {
            "start": "2025-01-01",
            "end": "2025-01-28",
            "holidays": ["2025-01-06"]
        },
        "optimizer": {"tolerance_pct": 10.0, "iteration_budget": 12, "seed": 7}
    }"#;
    let input: RosterInput = serde_json::from_str(json).unwrap();
    assert_eq!(input.period.slots_per_day, 1);
    assert_eq!(input.workers[0].work_fraction, 1.0);
    assert_eq!(input.optimizer.min_gap_days, 2);

    let roster = optimize_roster(&input).unwrap();
    let model = &roster.model;
    let schedule = &roster.outcome.schedule;

    let ana = model.worker_idx("ana").unwrap();
    let cai = model.worker_idx("cai").unwrap();
    let dee = model.worker_idx("dee").unwrap();
    assert!(schedule.works_on(ana, 5));
    assert!(!(9..=11).any(|day| schedule.works_on(cai, day)));
    assert!(schedule.worker_days(dee).all(|day| day <= 14));
    assert!(audit(model, schedule).iter().all(|v| !v.is_critical()));

    let snapshot = serde_json::to_value(roster.snapshot()).unwrap();
    assert_eq!(snapshot["days"].as_array().map(|d| d.len()), Some(28));
}

#[test]
fn test_invalid_json_configuration_fails_fast() {
    let json = r#"{
        "workers": [{"id": "ana", "incompatible_with": ["ben"]}, {"id": "ben"}],
        "period": {"start": "2025-01-01", "end": "2025-01-07"}
    }"#;
    let input: RosterInput = serde_json::from_str(json).unwrap();
    let err = optimize_roster(&input).unwrap_err();
    assert!(err.to_string().contains("ana"), "{}", err);
}
