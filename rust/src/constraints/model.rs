//! Constraint model: validated, indexed form of the worker and period input.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::availability::WorkerAvailability;
use crate::calendar::{Calendar, DayIdx};
use crate::config::OptimizerConfig;
use crate::interner::{WorkerIdx, WorkerInterner};
use crate::models::{Period, Worker};

/// Invalid worker, period or optimizer configuration.
///
/// Always raised before any scheduling attempt, and always names its locus.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("No workers configured")]
    NoWorkers,
    #[error("Duplicate worker id: {0}")]
    DuplicateWorker(String),
    #[error("Worker {worker}: work fraction {fraction} must be in (0, 1]")]
    InvalidWorkFraction { worker: String, fraction: f64 },
    #[error("Period {start}..{end} is empty")]
    EmptyPeriod { start: NaiveDate, end: NaiveDate },
    #[error("Slots per day must be at least 1")]
    InvalidSlotsPerDay,
    #[error("Worker {worker}: date range {start}..{end} is inverted")]
    InvalidDateRange {
        worker: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("Worker {worker}: mandatory date {date} is outside the period")]
    MandatoryOutsidePeriod { worker: String, date: NaiveDate },
    #[error("Worker {worker}: mandatory date {date} is also a day off")]
    MandatoryOnDayOff { worker: String, date: NaiveDate },
    #[error("Worker {worker}: mandatory date {date} is outside their work periods")]
    MandatoryOutsideWorkPeriod { worker: String, date: NaiveDate },
    #[error("Worker {worker}: mandatory dates {first} and {second} break the 7/14-day pattern")]
    MandatoryPatternConflict {
        worker: String,
        first: NaiveDate,
        second: NaiveDate,
    },
    #[error("{date}: {required} mandatory workers exceed {slots} slots")]
    MandatoryOverbooked {
        date: NaiveDate,
        required: usize,
        slots: usize,
    },
    #[error("{date}: incompatible workers {worker} and {other} are both mandatory")]
    MandatoryIncompatible {
        date: NaiveDate,
        worker: String,
        other: String,
    },
    #[error("Worker {worker}: incompatible with unknown worker {other}")]
    UnknownIncompatibleWorker { worker: String, other: String },
    #[error("Worker {worker}: cannot be incompatible with itself")]
    SelfIncompatible { worker: String },
    #[error("Worker {worker} lists {other} as incompatible but not vice versa")]
    AsymmetricIncompatibility { worker: String, other: String },
    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Per-worker constraint data, indexed by [`WorkerIdx`].
#[derive(Clone, Debug)]
pub struct WorkerProfile {
    pub id: String,
    pub work_fraction: f64,
    /// Configured target shift count (explicit or computed).
    pub target: u32,
    pub explicit_target: bool,
    pub availability: WorkerAvailability,
    /// Days this worker must hold a shift.
    pub mandatory: BTreeSet<DayIdx>,
    pub incompatible: FxHashSet<WorkerIdx>,
    /// Period days inside work periods and not forced off.
    pub available_days: usize,
}

impl WorkerProfile {
    /// Weight of this worker in proportional load sharing.
    pub fn load_weight(&self) -> f64 {
        self.work_fraction * self.available_days as f64
    }
}

/// Validated, immutable constraint model for one build/optimize/edit cycle.
#[derive(Clone, Debug)]
pub struct ConstraintModel {
    period: Period,
    calendar: Calendar,
    interner: WorkerInterner,
    profiles: Vec<WorkerProfile>,
    mandatory_by_day: Vec<Vec<WorkerIdx>>,
    min_gap_days: u32,
}

impl ConstraintModel {
    /// Validate the input and derive the model, failing fast on the first error.
    pub fn new(
        workers: &[Worker],
        period: &Period,
        config: &OptimizerConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        if period.slots_per_day == 0 {
            return Err(ConfigurationError::InvalidSlotsPerDay);
        }
        if period.num_days() == 0 {
            return Err(ConfigurationError::EmptyPeriod {
                start: period.start,
                end: period.end,
            });
        }
        if workers.is_empty() {
            return Err(ConfigurationError::NoWorkers);
        }

        let calendar = Calendar::new(period, config.pre_holiday_last_weekday);

        let mut interner = WorkerInterner::with_capacity(workers.len());
        for worker in workers {
            let (_, fresh) = interner.intern(&worker.id);
            if !fresh {
                return Err(ConfigurationError::DuplicateWorker(worker.id.clone()));
            }
        }

        let mut profiles = Vec::with_capacity(workers.len());
        for worker in workers {
            profiles.push(Self::build_profile(worker, period, &calendar, &interner)?);
        }

        Self::check_symmetry(&profiles)?;
        let mandatory_by_day = Self::index_mandatory(&profiles, &calendar, period.slots_per_day)?;

        let targets = compute_targets(workers, &profiles, period.total_slots());
        for (profile, target) in profiles.iter_mut().zip(targets) {
            profile.target = target.max(profile.mandatory.len() as u32);
        }

        Ok(Self {
            period: period.clone(),
            calendar,
            interner,
            profiles,
            mandatory_by_day,
            min_gap_days: config.min_gap_days,
        })
    }

    fn build_profile(
        worker: &Worker,
        period: &Period,
        calendar: &Calendar,
        interner: &WorkerInterner,
    ) -> Result<WorkerProfile, ConfigurationError> {
        let fraction = worker.work_fraction;
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(ConfigurationError::InvalidWorkFraction {
                worker: worker.id.clone(),
                fraction,
            });
        }

        if let Some(range) = worker
            .days_off
            .iter()
            .chain(worker.work_periods.iter())
            .find(|r| !r.is_valid())
        {
            return Err(ConfigurationError::InvalidDateRange {
                worker: worker.id.clone(),
                start: range.start,
                end: range.end,
            });
        }

        let availability = WorkerAvailability::new(&worker.work_periods, &worker.days_off);

        let mut mandatory = BTreeSet::new();
        for &date in &worker.mandatory_dates {
            let Some(day) = calendar.index_of(date) else {
                return Err(ConfigurationError::MandatoryOutsidePeriod {
                    worker: worker.id.clone(),
                    date,
                });
            };
            if availability.is_day_off(date) {
                return Err(ConfigurationError::MandatoryOnDayOff {
                    worker: worker.id.clone(),
                    date,
                });
            }
            if !availability.in_work_period(date) {
                return Err(ConfigurationError::MandatoryOutsideWorkPeriod {
                    worker: worker.id.clone(),
                    date,
                });
            }
            mandatory.insert(day);
        }

        // Mandatory dates may not contradict the 7/14-day pattern among themselves
        for &day in &mandatory {
            for offset in [7, 14] {
                if mandatory.contains(&(day + offset)) {
                    return Err(ConfigurationError::MandatoryPatternConflict {
                        worker: worker.id.clone(),
                        first: calendar.date(day),
                        second: calendar.date(day + offset),
                    });
                }
            }
        }

        let mut incompatible = FxHashSet::default();
        for other in &worker.incompatible_with {
            if *other == worker.id {
                return Err(ConfigurationError::SelfIncompatible {
                    worker: worker.id.clone(),
                });
            }
            match interner.get(other) {
                Some(idx) => {
                    incompatible.insert(idx);
                }
                None => {
                    return Err(ConfigurationError::UnknownIncompatibleWorker {
                        worker: worker.id.clone(),
                        other: other.clone(),
                    })
                }
            }
        }

        Ok(WorkerProfile {
            id: worker.id.clone(),
            work_fraction: fraction,
            target: 0,
            explicit_target: worker.target_shifts.is_some(),
            available_days: availability.available_days(period.range()),
            availability,
            mandatory,
            incompatible,
        })
    }

    fn check_symmetry(profiles: &[WorkerProfile]) -> Result<(), ConfigurationError> {
        for (idx, profile) in profiles.iter().enumerate() {
            let mut others: Vec<WorkerIdx> = profile.incompatible.iter().copied().collect();
            others.sort_unstable();
            for other in others {
                let back = &profiles[other as usize];
                if !back.incompatible.contains(&(idx as WorkerIdx)) {
                    return Err(ConfigurationError::AsymmetricIncompatibility {
                        worker: profile.id.clone(),
                        other: back.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn index_mandatory(
        profiles: &[WorkerProfile],
        calendar: &Calendar,
        slots_per_day: usize,
    ) -> Result<Vec<Vec<WorkerIdx>>, ConfigurationError> {
        let mut by_day: Vec<Vec<WorkerIdx>> = vec![Vec::new(); calendar.len()];
        for (idx, profile) in profiles.iter().enumerate() {
            for &day in &profile.mandatory {
                by_day[day].push(idx as WorkerIdx);
            }
        }

        for (day, workers) in by_day.iter().enumerate() {
            if workers.len() > slots_per_day {
                return Err(ConfigurationError::MandatoryOverbooked {
                    date: calendar.date(day),
                    required: workers.len(),
                    slots: slots_per_day,
                });
            }
            for (i, &a) in workers.iter().enumerate() {
                for &b in &workers[i + 1..] {
                    if profiles[a as usize].incompatible.contains(&b) {
                        return Err(ConfigurationError::MandatoryIncompatible {
                            date: calendar.date(day),
                            worker: profiles[a as usize].id.clone(),
                            other: profiles[b as usize].id.clone(),
                        });
                    }
                }
            }
        }

        Ok(by_day)
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn num_days(&self) -> usize {
        self.calendar.len()
    }

    pub fn slots_per_day(&self) -> usize {
        self.period.slots_per_day
    }

    pub fn total_slots(&self) -> usize {
        self.period.total_slots()
    }

    pub fn num_workers(&self) -> usize {
        self.profiles.len()
    }

    /// Iterator over all worker indices in configuration order.
    pub fn worker_indices(&self) -> impl Iterator<Item = WorkerIdx> {
        0..self.profiles.len() as WorkerIdx
    }

    pub fn profiles(&self) -> &[WorkerProfile] {
        &self.profiles
    }

    pub fn profile(&self, worker: WorkerIdx) -> &WorkerProfile {
        &self.profiles[worker as usize]
    }

    pub fn worker_idx(&self, id: &str) -> Option<WorkerIdx> {
        self.interner.get(id)
    }

    pub fn worker_id(&self, worker: WorkerIdx) -> &str {
        self.interner.resolve(worker).unwrap_or("?")
    }

    pub fn target(&self, worker: WorkerIdx) -> u32 {
        self.profiles[worker as usize].target
    }

    /// Configured minimum distance in days between shifts of one worker.
    pub fn min_gap_days(&self) -> u32 {
        self.min_gap_days
    }

    /// Workers that must hold a shift on `day`.
    pub fn mandatory_on(&self, day: DayIdx) -> &[WorkerIdx] {
        self.mandatory_by_day
            .get(day)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_mandatory(&self, worker: WorkerIdx, day: DayIdx) -> bool {
        self.profiles[worker as usize].mandatory.contains(&day)
    }

    pub fn are_incompatible(&self, a: WorkerIdx, b: WorkerIdx) -> bool {
        self.profiles[a as usize].incompatible.contains(&b)
    }

    /// Sum of all workers' load weights.
    pub fn total_load_weight(&self) -> f64 {
        self.profiles.iter().map(|p| p.load_weight()).sum()
    }
}

/// Split the period's slots into per-worker targets.
///
/// Explicit targets are honored; the remaining slots are shared among the
/// other workers in proportion to `work_fraction * available_days`, with
/// largest-remainder rounding so the shares sum exactly. Ties go to the
/// lexicographically smaller worker id.
fn compute_targets(workers: &[Worker], profiles: &[WorkerProfile], total_slots: usize) -> Vec<u32> {
    let explicit: u64 = workers
        .iter()
        .filter_map(|w| w.target_shifts)
        .map(u64::from)
        .sum();
    let pool = (total_slots as u64).saturating_sub(explicit);

    let auto: Vec<usize> = (0..workers.len())
        .filter(|&i| workers[i].target_shifts.is_none())
        .collect();
    let total_weight: f64 = auto.iter().map(|&i| profiles[i].load_weight()).sum();

    let mut targets: Vec<u32> = workers
        .iter()
        .map(|w| w.target_shifts.unwrap_or(0))
        .collect();
    if auto.is_empty() || total_weight <= 0.0 {
        return targets;
    }

    let mut remainders: Vec<(usize, f64)> = Vec::with_capacity(auto.len());
    let mut assigned: u64 = 0;
    for &i in &auto {
        let share = pool as f64 * profiles[i].load_weight() / total_weight;
        let floor = share.floor();
        targets[i] = floor as u32;
        assigned += floor as u64;
        remainders.push((i, share - floor));
    }

    remainders.sort_by(|(ia, ra), (ib, rb)| {
        rb.partial_cmp(ra)
            .unwrap_or(Ordering::Equal)
            .then_with(|| workers[*ia].id.cmp(&workers[*ib].id))
    });
    let leftover = pool.saturating_sub(assigned) as usize;
    for &(i, _) in remainders.iter().take(leftover) {
        targets[i] += 1;
    }

    targets
}
