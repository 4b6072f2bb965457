//! Worker availability tracking with sorted, non-overlapping date intervals.

use chrono::{Days, NaiveDate};

use crate::models::DateRange;

/// A set of dates stored as sorted, non-overlapping inclusive intervals.
///
/// Maintains the invariant that intervals are sorted by start date and that no
/// two intervals overlap or touch. This enables O(log n) membership lookups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DateIntervals {
    intervals: Vec<(NaiveDate, NaiveDate)>,
}

impl DateIntervals {
    /// Build from arbitrary (possibly overlapping, unsorted) ranges.
    pub fn new(ranges: impl IntoIterator<Item = DateRange>) -> Self {
        let periods: Vec<(NaiveDate, NaiveDate)> =
            ranges.into_iter().map(|r| (r.start, r.end)).collect();
        Self {
            intervals: Self::merge_periods(periods),
        }
    }

    /// Merge overlapping or adjacent periods into a sorted, non-overlapping list.
    fn merge_periods(mut periods: Vec<(NaiveDate, NaiveDate)>) -> Vec<(NaiveDate, NaiveDate)> {
        periods.sort_by_key(|(start, _)| *start);
        let mut merged: Vec<(NaiveDate, NaiveDate)> = Vec::with_capacity(periods.len());

        for (start, end) in periods {
            match merged.last_mut() {
                // Merge if overlapping or adjacent (within 1 day)
                Some((_, last_end))
                    if start <= last_end.checked_add_days(Days::new(1)).unwrap_or(*last_end) =>
                {
                    *last_end = (*last_end).max(end);
                }
                _ => merged.push((start, end)),
            }
        }

        merged
    }

    /// Whether `date` falls inside any interval.
    pub fn contains(&self, date: NaiveDate) -> bool {
        // Leftmost interval whose end is not before the date
        let idx = self.intervals.partition_point(|(_, end)| *end < date);
        self.intervals
            .get(idx)
            .is_some_and(|(start, _)| *start <= date)
    }

    /// The parts of `range` covered by the intervals, in order.
    fn clip(&self, range: DateRange) -> impl Iterator<Item = DateRange> + '_ {
        self.intervals
            .iter()
            .filter(move |(start, end)| *start <= range.end && *end >= range.start)
            .map(move |(start, end)| DateRange::new((*start).max(range.start), (*end).min(range.end)))
    }

    /// Number of days of `range` covered by the intervals.
    pub fn overlap_days(&self, range: DateRange) -> usize {
        self.clip(range).map(range_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

fn range_len(range: DateRange) -> usize {
    ((range.end - range.start).num_days() + 1).max(0) as usize
}

/// When a worker may be scheduled: work periods minus forced days off.
#[derive(Clone, Debug, Default)]
pub struct WorkerAvailability {
    /// `None` means the worker is eligible for the whole period.
    work_periods: Option<DateIntervals>,
    days_off: DateIntervals,
}

impl WorkerAvailability {
    pub fn new(work_periods: &[DateRange], days_off: &[DateRange]) -> Self {
        let work_periods = if work_periods.is_empty() {
            None
        } else {
            Some(DateIntervals::new(work_periods.iter().copied()))
        };
        Self {
            work_periods,
            days_off: DateIntervals::new(days_off.iter().copied()),
        }
    }

    /// Whether `date` lies inside one of the worker's eligible work periods.
    pub fn in_work_period(&self, date: NaiveDate) -> bool {
        self.work_periods
            .as_ref()
            .map_or(true, |periods| periods.contains(date))
    }

    pub fn is_day_off(&self, date: NaiveDate) -> bool {
        self.days_off.contains(date)
    }

    pub fn days_off_is_empty(&self) -> bool {
        self.days_off.is_empty()
    }

    pub fn is_available(&self, date: NaiveDate) -> bool {
        self.in_work_period(date) && !self.is_day_off(date)
    }

    /// Count of days in `range` the worker could be scheduled.
    pub fn available_days(&self, range: DateRange) -> usize {
        match &self.work_periods {
            None => range_len(range).saturating_sub(self.days_off.overlap_days(range)),
            Some(periods) => periods
                .clip(range)
                .map(|part| range_len(part).saturating_sub(self.days_off.overlap_days(part)))
                .sum(),
        }
    }
}
