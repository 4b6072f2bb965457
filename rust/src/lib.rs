//! On-call shift scheduling engine.
//!
//! Builds a roster that never breaks a hard rule (mandatory dates, days off,
//! incompatibilities, the 7/14-day pattern), optimizes it for coverage and
//! proportional fairness with strictly bounded relaxation of soft rules, audits
//! its balance, and applies post-publication edits with undo/redo.
//!
//! The pipeline is configuration -> [`ConstraintModel`] -> [`StrictBuilder`] ->
//! [`IterativeOptimizer`] -> [`BalanceValidator`] -> [`UpdateEngine`].

pub mod availability;
pub mod balance;
pub mod calendar;
pub mod config;
pub mod constraints;
pub mod editing;
mod interner;
pub mod logging;
pub mod models;
pub mod schedule;
pub mod scheduler;

#[cfg(feature = "python")]
mod python;

use thiserror::Error;

pub use availability::{DateIntervals, WorkerAvailability};
pub use balance::{BalanceReport, BalanceValidator, TransferRecommendation, WorkerStats};
pub use calendar::{Calendar, DayIdx, DayKind};
pub use config::{OptimizerConfig, PriorityWeights, RosterInput};
pub use constraints::{
    audit, is_eligible, BlockReason, ConfigurationError, ConstraintModel, ConstraintViolation,
    HardRule, RuleContext, Severity, ViolationKind,
};
pub use editing::{
    ChangeEvent, ChangeKind, EditCheck, EditId, EditState, EngineError, HistoryStats,
    UpdateEngine,
};
pub use interner::{WorkerIdx, WorkerInterner};
pub use models::{symmetrize_incompatibilities, DateRange, Period, Worker};
pub use schedule::{DaySnapshot, Schedule, ScheduleSnapshot, ScheduleView};
pub use scheduler::{
    CancellationToken, InfeasibleSlot, IterativeOptimizer, OptimizationOutcome, Relaxation,
    RelaxationExhausted, RelaxationLevel, StopReason, StrictBuilder, StrictDistribution,
};

/// Any failure surfaced by the crate's top-level entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardiaError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// An optimized roster together with the model it was built against.
#[derive(Clone, Debug)]
pub struct Roster {
    pub model: ConstraintModel,
    pub config: OptimizerConfig,
    pub outcome: OptimizationOutcome,
}

impl Roster {
    pub fn snapshot(&self) -> ScheduleSnapshot {
        self.outcome.schedule.to_snapshot(&self.model)
    }

    /// Freeze the optimized schedule and hand it to an update engine.
    pub fn publish(self) -> Result<UpdateEngine, GuardiaError> {
        let engine = UpdateEngine::publish(self.model, &self.config, self.outcome.schedule)?;
        Ok(engine)
    }
}

/// Validate `input`, then build and optimize a roster for it.
pub fn optimize_roster(input: &RosterInput) -> Result<Roster, GuardiaError> {
    let model = ConstraintModel::new(&input.workers, &input.period, &input.optimizer)?;
    let outcome = IterativeOptimizer::new(&model, &input.optimizer).optimize(None);
    Ok(Roster {
        model,
        config: input.optimizer.clone(),
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_optimize_and_publish() {
        let input = RosterInput {
            workers: (0..4).map(|i| Worker::new(format!("w{}", i))).collect(),
            period: Period::new(d(2025, 1, 1), d(2025, 1, 14), 1),
            optimizer: OptimizerConfig {
                parallel: false,
                ..Default::default()
            },
        };
        let roster = optimize_roster(&input).unwrap();
        assert!(roster.outcome.is_complete());
        assert_eq!(roster.snapshot().days.len(), 14);

        let engine = roster.publish().unwrap();
        assert_eq!(engine.version(), 0);
        assert_eq!(engine.published().filled_slots(), 14);
    }

    #[test]
    fn test_configuration_error_surfaces() {
        let input = RosterInput {
            workers: Vec::new(),
            period: Period::new(d(2025, 1, 1), d(2025, 1, 7), 1),
            optimizer: OptimizerConfig::default(),
        };
        assert_eq!(
            optimize_roster(&input).err(),
            Some(GuardiaError::Configuration(ConfigurationError::NoWorkers))
        );
    }
}
