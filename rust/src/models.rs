//! Core input data types: workers, date ranges, and the scheduling period.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// An inclusive range of dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A range covering exactly one date.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

fn default_work_fraction() -> f64 {
    1.0
}

/// A worker in the on-call pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    /// Unique identifier.
    pub id: String,
    /// Share of a full-time load, in (0, 1].
    #[serde(default = "default_work_fraction")]
    pub work_fraction: f64,
    /// Explicit shift target; computed from the work fraction when absent.
    #[serde(default)]
    pub target_shifts: Option<u32>,
    /// Dates on which this worker must receive a shift.
    #[serde(default)]
    pub mandatory_dates: Vec<NaiveDate>,
    /// Dates on which this worker must not receive a shift.
    #[serde(default)]
    pub days_off: Vec<DateRange>,
    /// Intervals the worker is eligible for; empty means the whole period.
    #[serde(default)]
    pub work_periods: Vec<DateRange>,
    /// Workers that may never share a day with this one.
    #[serde(default)]
    pub incompatible_with: Vec<String>,
}

impl Worker {
    /// A full-time worker with no individual constraints.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            work_fraction: 1.0,
            target_shifts: None,
            mandatory_dates: Vec::new(),
            days_off: Vec::new(),
            work_periods: Vec::new(),
            incompatible_with: Vec::new(),
        }
    }

    pub fn with_fraction(mut self, work_fraction: f64) -> Self {
        self.work_fraction = work_fraction;
        self
    }

    pub fn with_target(mut self, target_shifts: u32) -> Self {
        self.target_shifts = Some(target_shifts);
        self
    }

    pub fn with_mandatory(mut self, date: NaiveDate) -> Self {
        self.mandatory_dates.push(date);
        self
    }

    pub fn with_day_off(mut self, date: NaiveDate) -> Self {
        self.days_off.push(DateRange::single(date));
        self
    }

    pub fn with_days_off(mut self, range: DateRange) -> Self {
        self.days_off.push(range);
        self
    }

    pub fn with_work_period(mut self, range: DateRange) -> Self {
        self.work_periods.push(range);
        self
    }

    pub fn incompatible_with(mut self, other: impl Into<String>) -> Self {
        self.incompatible_with.push(other.into());
        self
    }
}

/// Make incompatibility declarations symmetric in place.
///
/// Configuration validation rejects one-sided declarations; callers that
/// collect incompatibilities from one side only can normalize with this first.
/// Unknown IDs are left alone so validation can report them.
pub fn symmetrize_incompatibilities(workers: &mut [Worker]) {
    let positions: FxHashMap<String, usize> = workers
        .iter()
        .enumerate()
        .map(|(i, w)| (w.id.clone(), i))
        .collect();

    let mut missing: Vec<(usize, String)> = Vec::new();
    for worker in workers.iter() {
        for other in &worker.incompatible_with {
            if let Some(&j) = positions.get(other) {
                if !workers[j].incompatible_with.contains(&worker.id) {
                    missing.push((j, worker.id.clone()));
                }
            }
        }
    }

    for (j, id) in missing {
        if !workers[j].incompatible_with.contains(&id) {
            workers[j].incompatible_with.push(id);
        }
    }
}

fn default_slots_per_day() -> usize {
    1
}

/// The calendar period to staff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Period {
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (inclusive).
    pub end: NaiveDate,
    #[serde(default)]
    pub holidays: Vec<NaiveDate>,
    /// Shift slots that must be staffed each day (>= 1).
    #[serde(default = "default_slots_per_day")]
    pub slots_per_day: usize,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate, slots_per_day: usize) -> Self {
        Self {
            start,
            end,
            holidays: Vec::new(),
            slots_per_day,
        }
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    /// Number of days in the period (0 if the range is inverted).
    pub fn num_days(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            ((self.end - self.start).num_days() + 1) as usize
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.start, self.end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.range().contains(date)
    }

    /// Required day/slot pairs over the whole period.
    pub fn total_slots(&self) -> usize {
        self.num_days() * self.slots_per_day
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_period_days() {
        let period = Period::new(d(2025, 3, 1), d(2025, 3, 31), 2);
        assert_eq!(period.num_days(), 31);
        assert_eq!(period.total_slots(), 62);
        assert!(period.contains(d(2025, 3, 15)));
        assert!(!period.contains(d(2025, 4, 1)));

        let inverted = Period::new(d(2025, 3, 2), d(2025, 3, 1), 1);
        assert_eq!(inverted.num_days(), 0);
    }

    #[test]
    fn test_symmetrize_incompatibilities() {
        let mut workers = vec![
            Worker::new("a").incompatible_with("b"),
            Worker::new("b"),
            Worker::new("c").incompatible_with("a").incompatible_with("ghost"),
        ];
        symmetrize_incompatibilities(&mut workers);

        assert_eq!(workers[1].incompatible_with, vec!["a".to_string()]);
        assert!(workers[0].incompatible_with.contains(&"c".to_string()));
        // Unknown ids are left for validation to report
        assert!(workers[2].incompatible_with.contains(&"ghost".to_string()));
    }

    #[test]
    fn test_worker_deserialize_defaults() {
        let worker: Worker = serde_json::from_str(r#"{"id": "w1"}"#).unwrap();
        assert_eq!(worker, Worker::new("w1"));

        let period: Period =
            serde_json::from_str(r#"{"start": "2025-01-01", "end": "2025-01-31"}"#).unwrap();
        assert_eq!(period.slots_per_day, 1);
        assert!(period.holidays.is_empty());
    }
}
