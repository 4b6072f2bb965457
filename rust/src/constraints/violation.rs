//! Violation records produced by auditing and balance validation.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// How serious a finding is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    /// Informational; never blocks publication.
    Advisory,
    Warning,
    /// A hard-rule breach or an out-of-emergency-band imbalance.
    Critical,
}

/// What was violated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ViolationKind {
    DoubleBooking,
    Incompatibility,
    WeeklyPattern,
    DayOff,
    OutsideWorkPeriod,
    MandatoryMissing,
    /// Two shifts `distance` days apart, closer than the configured gap.
    MinimumGap { distance: u32 },
    UnfilledSlot { slot: usize },
    TotalDeviation {
        assigned: u32,
        expected: f64,
        deviation_pct: f64,
    },
    WeekendDeviation {
        assigned: u32,
        expected: f64,
        deviation_pct: f64,
    },
    /// Shifts on `day` and the following date.
    ConsecutiveDays { next: NaiveDate },
}

/// One finding, always attached to its locus.
///
/// Recomputed on demand; never stored as schedule state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConstraintViolation {
    pub kind: ViolationKind,
    pub day: Option<NaiveDate>,
    pub workers: Vec<String>,
    pub severity: Severity,
}

impl ConstraintViolation {
    pub fn new(
        kind: ViolationKind,
        day: Option<NaiveDate>,
        workers: Vec<String>,
        severity: Severity,
    ) -> Self {
        Self {
            kind,
            day,
            workers,
            severity,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {:?}", self.severity, self.kind)?;
        if let Some(day) = self.day {
            write!(f, " on {}", day)?;
        }
        if !self.workers.is_empty() {
            write!(f, " ({})", self.workers.join(", "))?;
        }
        Ok(())
    }
}

/// Whether any finding is critical.
pub fn has_critical(violations: &[ConstraintViolation]) -> bool {
    violations.iter().any(|v| v.is_critical())
}
