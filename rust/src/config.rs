//! Configuration types for the roster engine.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::constraints::ConfigurationError;
use crate::models::{Period, Worker};

/// Hard ceiling on how far a worker's target may be raised by relaxation.
pub const MAX_TARGET_INCREASE_PCT: f64 = 10.0;
/// Hard ceiling on how many days the minimum gap may shrink by relaxation.
pub const MAX_GAP_RELAXATION_DAYS: u32 = 1;
/// A gap reduction is never granted to a worker needing fewer shifts than this.
pub const MIN_REMAINING_FOR_GAP_RELAXATION: u32 = 3;
/// Upper bound on optimizer restarts.
pub const MAX_ITERATIONS: usize = 60;

/// Weights for the candidate priority score (higher score = picked first).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    /// Per remaining shift until target.
    pub remaining: f64,
    /// Per unit of remaining/target ratio (fairness to work fraction).
    pub remaining_ratio: f64,
    /// Per shift of weekend deficit, applied on weekend-class days only.
    pub weekend_deficit: f64,
    /// For distance to the nearest existing assignment (capped at 14 days).
    pub spacing: f64,
    /// Amplitude of random jitter added on perturbed restarts.
    pub jitter: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            remaining: 1.0,
            remaining_ratio: 4.0,
            weekend_deficit: 2.0,
            spacing: 1.0,
            jitter: 1.5,
        }
    }
}

/// Configuration for building, optimizing, validating and editing a roster.
///
/// Passed explicitly into every call; read-only for the duration of a cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Balance tolerance band in percent.
    pub tolerance_pct: f64,
    /// Deviation beyond this is critical rather than a warning.
    pub emergency_tolerance_pct: f64,
    /// Optimizer restarts; `None` derives the budget from problem complexity.
    pub iteration_budget: Option<usize>,
    /// Stop after this many consecutive restarts without improvement.
    pub stall_limit: usize,
    /// Minimum distance in days between two shifts of the same worker.
    pub min_gap_days: u32,
    /// Maximum target increase granted by relaxation, in percent (<= 10).
    pub max_target_increase_pct: f64,
    /// Days the minimum gap may shrink by relaxation (<= 1).
    pub gap_relaxation_days: u32,
    /// Remaining shifts a worker needs before a gap reduction applies (>= 3).
    pub gap_relaxation_min_remaining: u32,
    /// Undo stack depth of the incremental update engine.
    pub history_depth: usize,
    /// Last weekday on which a pre-holiday counts as Friday-equivalent.
    pub pre_holiday_last_weekday: Weekday,
    /// How many recent decisions the strict builder may revisit.
    pub backtrack_depth: usize,
    /// Total backtracks allowed per strict build.
    pub backtrack_budget: usize,
    pub priority: PriorityWeights,
    /// Base seed for perturbed restarts.
    pub seed: u64,
    /// Run restarts on the rayon thread pool.
    pub parallel: bool,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            tolerance_pct: 10.0,
            emergency_tolerance_pct: 12.0,
            iteration_budget: None,
            stall_limit: 5,
            min_gap_days: 2,
            max_target_increase_pct: MAX_TARGET_INCREASE_PCT,
            gap_relaxation_days: MAX_GAP_RELAXATION_DAYS,
            gap_relaxation_min_remaining: MIN_REMAINING_FOR_GAP_RELAXATION,
            history_depth: 50,
            pre_holiday_last_weekday: Weekday::Thu,
            backtrack_depth: 8,
            backtrack_budget: 256,
            priority: PriorityWeights::default(),
            seed: 0x5eed,
            parallel: true,
            verbosity: 0,
        }
    }
}

impl OptimizerConfig {
    /// Check every setting against its permitted range.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        fn invalid(name: &'static str, reason: String) -> Result<(), ConfigurationError> {
            Err(ConfigurationError::InvalidSetting { name, reason })
        }

        if !(self.tolerance_pct > 0.0) {
            return invalid("tolerance_pct", format!("{} must be > 0", self.tolerance_pct));
        }
        if !(self.emergency_tolerance_pct >= self.tolerance_pct) {
            return invalid(
                "emergency_tolerance_pct",
                format!(
                    "{} must be >= tolerance_pct ({})",
                    self.emergency_tolerance_pct, self.tolerance_pct
                ),
            );
        }
        if let Some(budget) = self.iteration_budget {
            if budget == 0 || budget > MAX_ITERATIONS {
                return invalid(
                    "iteration_budget",
                    format!("{} must be within 1..={}", budget, MAX_ITERATIONS),
                );
            }
        }
        if self.min_gap_days == 0 {
            return invalid("min_gap_days", "must be >= 1".to_string());
        }
        if !(0.0..=MAX_TARGET_INCREASE_PCT).contains(&self.max_target_increase_pct) {
            return invalid(
                "max_target_increase_pct",
                format!(
                    "{} must be within 0..={}",
                    self.max_target_increase_pct, MAX_TARGET_INCREASE_PCT
                ),
            );
        }
        if self.gap_relaxation_days > MAX_GAP_RELAXATION_DAYS {
            return invalid(
                "gap_relaxation_days",
                format!("{} must be <= {}", self.gap_relaxation_days, MAX_GAP_RELAXATION_DAYS),
            );
        }
        if self.gap_relaxation_min_remaining < MIN_REMAINING_FOR_GAP_RELAXATION {
            return invalid(
                "gap_relaxation_min_remaining",
                format!(
                    "{} must be >= {}",
                    self.gap_relaxation_min_remaining, MIN_REMAINING_FOR_GAP_RELAXATION
                ),
            );
        }
        if self.history_depth == 0 {
            return invalid("history_depth", "must be >= 1".to_string());
        }
        let weights = &self.priority;
        if [
            weights.remaining,
            weights.remaining_ratio,
            weights.weekend_deficit,
            weights.spacing,
            weights.jitter,
        ]
        .iter()
        .any(|w| !w.is_finite() || *w < 0.0)
        {
            return invalid("priority", "weights must be finite and >= 0".to_string());
        }
        Ok(())
    }
}

/// The complete input of one build/optimize cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RosterInput {
    pub workers: Vec<Worker>,
    pub period: Period,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}
