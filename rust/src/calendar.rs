//! Day classification for the scheduling period.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::models::Period;

/// Index of a day within the period (0 = period start).
pub type DayIdx = usize;

/// Load classification of a date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayKind {
    Weekday,
    /// Friday, Saturday or Sunday.
    Weekend,
    Holiday,
    /// Day before a holiday, counted as a Friday-equivalent.
    PreHoliday,
}

impl DayKind {
    /// Whether a shift on this day counts toward weekend load.
    pub fn counts_as_weekend(self) -> bool {
        !matches!(self, DayKind::Weekday)
    }
}

/// Classify a single date.
///
/// A pre-holiday only upgrades a weekday falling Monday through
/// `pre_holiday_last_weekday` (inclusive); Friday to Sunday are weekend anyway.
pub fn classify(
    date: NaiveDate,
    holidays: &FxHashSet<NaiveDate>,
    pre_holiday_last_weekday: Weekday,
) -> DayKind {
    if holidays.contains(&date) {
        return DayKind::Holiday;
    }
    let weekday = date.weekday();
    if matches!(weekday, Weekday::Fri | Weekday::Sat | Weekday::Sun) {
        return DayKind::Weekend;
    }
    let next_is_holiday = date
        .checked_add_days(Days::new(1))
        .is_some_and(|next| holidays.contains(&next));
    if next_is_holiday
        && weekday.num_days_from_monday() <= pre_holiday_last_weekday.num_days_from_monday()
    {
        return DayKind::PreHoliday;
    }
    DayKind::Weekday
}

/// Pre-classified days of a period with date/index conversion.
#[derive(Clone, Debug)]
pub struct Calendar {
    start: NaiveDate,
    kinds: Vec<DayKind>,
}

impl Calendar {
    pub fn new(period: &Period, pre_holiday_last_weekday: Weekday) -> Self {
        let holidays: FxHashSet<NaiveDate> = period.holidays.iter().copied().collect();
        let kinds = (0..period.num_days())
            .filter_map(|i| period.start.checked_add_days(Days::new(i as u64)))
            .map(|date| classify(date, &holidays, pre_holiday_last_weekday))
            .collect();
        Self {
            start: period.start,
            kinds,
        }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Date of day `idx`. Indices past the end still map to real dates.
    pub fn date(&self, idx: DayIdx) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(idx as u64))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Index of `date`, if it lies within the period.
    pub fn index_of(&self, date: NaiveDate) -> Option<DayIdx> {
        let offset = (date - self.start).num_days();
        if offset < 0 || offset as usize >= self.kinds.len() {
            None
        } else {
            Some(offset as usize)
        }
    }

    pub fn kind(&self, idx: DayIdx) -> DayKind {
        self.kinds.get(idx).copied().unwrap_or(DayKind::Weekday)
    }

    pub fn is_weekend(&self, idx: DayIdx) -> bool {
        self.kind(idx).counts_as_weekend()
    }

    /// Number of days counting toward weekend load.
    pub fn weekend_days(&self) -> usize {
        self.kinds.iter().filter(|k| k.counts_as_weekend()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_weekend_days() {
        let holidays = FxHashSet::default();
        // 2025-01-03 is a Friday
        assert_eq!(classify(d(2025, 1, 2), &holidays, Weekday::Thu), DayKind::Weekday);
        assert_eq!(classify(d(2025, 1, 3), &holidays, Weekday::Thu), DayKind::Weekend);
        assert_eq!(classify(d(2025, 1, 4), &holidays, Weekday::Thu), DayKind::Weekend);
        assert_eq!(classify(d(2025, 1, 5), &holidays, Weekday::Thu), DayKind::Weekend);
        assert_eq!(classify(d(2025, 1, 6), &holidays, Weekday::Thu), DayKind::Weekday);
    }

    #[test]
    fn test_pre_holiday_boundary() {
        // Holiday on Friday 2025-05-02 makes Thursday 2025-05-01 a pre-holiday
        let holidays: FxHashSet<NaiveDate> = [d(2025, 5, 2)].into_iter().collect();
        assert_eq!(classify(d(2025, 5, 2), &holidays, Weekday::Thu), DayKind::Holiday);
        assert_eq!(classify(d(2025, 5, 1), &holidays, Weekday::Thu), DayKind::PreHoliday);
        // With an exclusive Thursday boundary it stays a weekday
        assert_eq!(classify(d(2025, 5, 1), &holidays, Weekday::Wed), DayKind::Weekday);
    }

    #[test]
    fn test_pre_holiday_on_weekend_is_weekend() {
        // Holiday on Monday 2025-01-06: the Sunday before is plain weekend
        let holidays: FxHashSet<NaiveDate> = [d(2025, 1, 6)].into_iter().collect();
        assert_eq!(classify(d(2025, 1, 5), &holidays, Weekday::Thu), DayKind::Weekend);
    }

    #[test]
    fn test_calendar_indexing() {
        let period = Period::new(d(2025, 1, 1), d(2025, 1, 14), 1).with_holidays([d(2025, 1, 8)]);
        let calendar = Calendar::new(&period, Weekday::Thu);

        assert_eq!(calendar.len(), 14);
        assert_eq!(calendar.index_of(d(2025, 1, 1)), Some(0));
        assert_eq!(calendar.index_of(d(2025, 1, 14)), Some(13));
        assert_eq!(calendar.index_of(d(2024, 12, 31)), None);
        assert_eq!(calendar.index_of(d(2025, 1, 15)), None);
        assert_eq!(calendar.date(7), d(2025, 1, 8));
        assert_eq!(calendar.kind(7), DayKind::Holiday);
        assert_eq!(calendar.kind(6), DayKind::PreHoliday);
        // Fri/Sat/Sun x2 + holiday + pre-holiday
        assert_eq!(calendar.weekend_days(), 8);
    }
}
