//! Iteration budget for the optimizer.

use crate::config::{OptimizerConfig, MAX_ITERATIONS};
use crate::constraints::ConstraintModel;

/// Fewest restarts an adaptive budget will ever pick.
pub const MIN_ADAPTIVE_ITERATIONS: usize = 5;

/// Problem complexity: `workers * slots/day * days * (1 + constraint factor)`.
///
/// The constraint factor adds 0.2 per worker with incompatibilities, 0.15 per
/// worker under 70% work fraction, and 0.1 per worker with days off or
/// mandatory dates.
pub fn complexity(model: &ConstraintModel) -> f64 {
    let base = (model.num_workers() * model.slots_per_day() * model.num_days()) as f64;
    let factor: f64 = model
        .profiles()
        .iter()
        .map(|p| {
            let mut f = 0.0;
            if !p.incompatible.is_empty() {
                f += 0.2;
            }
            if p.work_fraction < 0.7 {
                f += 0.15;
            }
            if !p.availability.days_off_is_empty() || !p.mandatory.is_empty() {
                f += 0.1;
            }
            f
        })
        .sum();
    base * (1.0 + factor)
}

/// Restart count for this problem: the configured budget, or one derived
/// from complexity.
pub fn iteration_budget(model: &ConstraintModel, config: &OptimizerConfig) -> usize {
    if let Some(budget) = config.iteration_budget {
        return budget.clamp(1, MAX_ITERATIONS);
    }
    let score = complexity(model);
    let budget = if score < 1_000.0 {
        10
    } else if score < 5_000.0 {
        20
    } else if score < 15_000.0 {
        40
    } else {
        60
    };
    budget.clamp(MIN_ADAPTIVE_ITERATIONS, MAX_ITERATIONS)
}
