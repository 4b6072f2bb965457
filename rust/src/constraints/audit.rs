//! Full-schedule scan for hard-rule breaches.

use crate::interner::WorkerIdx;
use crate::schedule::{Schedule, ScheduleView};

use super::model::ConstraintModel;
use super::violation::{ConstraintViolation, Severity, ViolationKind};

/// Scan a schedule for every hard-rule breach.
///
/// Hard breaches are `Critical`. Shifts closer than the configured minimum gap
/// are `Warning`s, since the optimizer may have reduced a gap on purpose.
pub fn audit(model: &ConstraintModel, schedule: &Schedule) -> Vec<ConstraintViolation> {
    let calendar = model.calendar();
    let id = |w: WorkerIdx| model.worker_id(w).to_string();
    let mut found = Vec::new();

    for day in 0..schedule.num_days() {
        let date = calendar.date(day);
        let occupants: Vec<WorkerIdx> = schedule.day(day).iter().flatten().copied().collect();

        for (i, &worker) in occupants.iter().enumerate() {
            let rest = &occupants[i + 1..];
            if rest.contains(&worker) {
                found.push(ConstraintViolation::new(
                    ViolationKind::DoubleBooking,
                    Some(date),
                    vec![id(worker)],
                    Severity::Critical,
                ));
            }
            for &other in rest {
                if other != worker && model.are_incompatible(worker, other) {
                    found.push(ConstraintViolation::new(
                        ViolationKind::Incompatibility,
                        Some(date),
                        vec![id(worker), id(other)],
                        Severity::Critical,
                    ));
                }
            }

            let availability = &model.profile(worker).availability;
            if !availability.in_work_period(date) {
                found.push(ConstraintViolation::new(
                    ViolationKind::OutsideWorkPeriod,
                    Some(date),
                    vec![id(worker)],
                    Severity::Critical,
                ));
            }
            if availability.is_day_off(date) {
                found.push(ConstraintViolation::new(
                    ViolationKind::DayOff,
                    Some(date),
                    vec![id(worker)],
                    Severity::Critical,
                ));
            }
        }
    }

    let min_gap = model.min_gap_days();
    for worker in model.worker_indices() {
        let days: Vec<usize> = schedule.worker_days(worker).collect();

        for (i, &day) in days.iter().enumerate() {
            for &later in &days[i + 1..] {
                let distance = later - day;
                if distance > 14 {
                    break;
                }
                if distance == 7 || distance == 14 {
                    found.push(ConstraintViolation::new(
                        ViolationKind::WeeklyPattern,
                        Some(calendar.date(later)),
                        vec![id(worker)],
                        Severity::Critical,
                    ));
                }
            }
        }

        for pair in days.windows(2) {
            let distance = (pair[1] - pair[0]) as u32;
            if distance < min_gap {
                found.push(ConstraintViolation::new(
                    ViolationKind::MinimumGap { distance },
                    Some(calendar.date(pair[1])),
                    vec![id(worker)],
                    Severity::Warning,
                ));
            }
        }

        for &day in &model.profile(worker).mandatory {
            if !schedule.works_on(worker, day) {
                found.push(ConstraintViolation::new(
                    ViolationKind::MandatoryMissing,
                    Some(calendar.date(day)),
                    vec![id(worker)],
                    Severity::Critical,
                ));
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::constraints::has_critical;
    use crate::models::{Period, Worker};
    use chrono::NaiveDate;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn model() -> ConstraintModel {
        let workers = vec![
            Worker::new("a")
                .incompatible_with("b")
                .with_mandatory(d(2025, 1, 3)),
            Worker::new("b").incompatible_with("a").with_day_off(d(2025, 1, 10)),
            Worker::new("c"),
        ];
        let period = Period::new(d(2025, 1, 1), d(2025, 1, 21), 2);
        ConstraintModel::new(&workers, &period, &OptimizerConfig::default()).unwrap()
    }

    fn kinds(found: &[ConstraintViolation]) -> Vec<&ViolationKind> {
        found.iter().map(|v| &v.kind).collect()
    }

    #[test]
    fn test_clean_schedule_has_no_findings() {
        let model = model();
        let mut schedule = Schedule::empty(d(2025, 1, 1), 21, 2, 3);
        schedule.assign(2, 0, 0);
        schedule.assign(2, 1, 2);
        schedule.assign(5, 0, 1);
        assert!(audit(&model, &schedule).is_empty());
    }

    #[test]
    fn test_detects_hard_breaches() {
        let model = model();
        let mut schedule = Schedule::empty(d(2025, 1, 1), 21, 2, 3);
        // Mandatory day 2 left to c; a and b share day 4; b works its day off
        schedule.assign(2, 0, 2);
        schedule.assign(4, 0, 0);
        schedule.assign(4, 1, 1);
        schedule.assign(9, 0, 1);
        schedule.assign(16, 0, 2);

        let found = audit(&model, &schedule);
        let kinds = kinds(&found);
        assert!(kinds.contains(&&ViolationKind::Incompatibility));
        assert!(kinds.contains(&&ViolationKind::DayOff));
        assert!(kinds.contains(&&ViolationKind::MandatoryMissing));
        // c on days 2 and 16 is 14 apart
        assert!(kinds.contains(&&ViolationKind::WeeklyPattern));
        assert!(has_critical(&found));
    }

    #[test]
    fn test_gap_breach_is_warning() {
        let model = model();
        let mut schedule = Schedule::empty(d(2025, 1, 1), 21, 2, 3);
        schedule.assign(2, 0, 0);
        schedule.assign(11, 0, 2);
        schedule.assign(12, 0, 2);

        let found = audit(&model, &schedule);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, ViolationKind::MinimumGap { distance: 1 });
        assert_eq!(found[0].severity, Severity::Warning);
        assert!(!has_critical(&found));
    }
}
