//! Iterative optimizer: independent restarts with bounded relaxation.
//!
//! The deterministic strict distribution is the baseline. Each restart builds
//! a fresh (or seeded, perturbed) strict distribution, repairs it with the
//! relaxation passes, and competes on coverage, then balance score, then fewer
//! relaxations. Restarts run in fixed-size batches on the rayon pool; results
//! are folded in iteration order so the outcome does not depend on thread
//! count. Cancellation is checked between batches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::balance::{BalanceReport, BalanceValidator};
use crate::config::OptimizerConfig;
use crate::constraints::{audit, ConstraintModel, RuleContext};
use crate::schedule::Schedule;
use crate::{log_changes, log_checks};

use super::iterations::iteration_budget;
use super::relaxation::{Relaxation, RelaxationLevel, Repairer};
use super::strict::{diagnose, InfeasibleSlot, StrictBuilder, StrictDistribution};

/// Restarts evaluated between cancellation checks.
const BATCH_SIZE: usize = 4;

/// Cooperative cancellation flag shared with the caller.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The optimizer could not reach full coverage within its budget.
///
/// Attached to the outcome alongside the best schedule found.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("Coverage {:.1}% after relaxation; {} slots unfilled", .coverage * 100.0, .unfilled.len())]
pub struct RelaxationExhausted {
    pub coverage: f64,
    pub unfilled: Vec<InfeasibleSlot>,
}

/// A restart that produced an unusable schedule; it is discarded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IterationError {
    #[error("Iteration {iteration}: hard rule broken: {violation}")]
    HardRuleBroken { iteration: usize, violation: String },
    #[error("Iteration {iteration}: repair lost coverage ({before} -> {after} slots)")]
    CoverageRegressed {
        iteration: usize,
        before: usize,
        after: usize,
    },
}

/// Why the optimizer stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Full coverage with every worker inside the tolerance band.
    TargetReached,
    /// `stall_limit` restarts in a row without improvement.
    Stalled,
    BudgetExhausted,
    Cancelled,
}

/// Best schedule found, annotated with how it was obtained.
#[derive(Clone, Debug)]
pub struct OptimizationOutcome {
    pub schedule: Schedule,
    pub balance: BalanceReport,
    pub relaxations: Vec<Relaxation>,
    pub unfilled: Vec<InfeasibleSlot>,
    pub coverage: f64,
    /// Coverage of the deterministic strict distribution.
    pub strict_coverage: f64,
    pub iterations_run: usize,
    /// 0 when the strict baseline was never beaten.
    pub best_iteration: usize,
    pub discarded: usize,
    pub stop_reason: StopReason,
    pub exhausted: Option<RelaxationExhausted>,
}

impl OptimizationOutcome {
    pub fn is_complete(&self) -> bool {
        self.unfilled.is_empty()
    }

    /// The loosest relaxation the chosen schedule needed.
    pub fn relaxation_level(&self) -> RelaxationLevel {
        self.relaxations
            .iter()
            .map(Relaxation::level)
            .max()
            .unwrap_or(RelaxationLevel::Strict)
    }
}

struct Candidate {
    iteration: usize,
    schedule: Schedule,
    relaxations: Vec<Relaxation>,
    balance: BalanceReport,
    filled: usize,
}

impl Candidate {
    fn beats(&self, other: &Candidate) -> bool {
        if self.filled != other.filled {
            return self.filled > other.filled;
        }
        if self.balance.score != other.balance.score {
            return self.balance.score > other.balance.score;
        }
        self.relaxations.len() < other.relaxations.len()
    }

    fn target_reached(&self) -> bool {
        self.filled == self.schedule.total_slots() && self.balance.is_balanced()
    }
}

/// Runs restarts for one model and configuration.
pub struct IterativeOptimizer<'a> {
    model: &'a ConstraintModel,
    config: &'a OptimizerConfig,
    validator: BalanceValidator,
}

impl<'a> IterativeOptimizer<'a> {
    pub fn new(model: &'a ConstraintModel, config: &'a OptimizerConfig) -> Self {
        Self {
            model,
            config,
            validator: BalanceValidator::new(config),
        }
    }

    pub fn optimize(&self, cancel: Option<&CancellationToken>) -> OptimizationOutcome {
        let verbosity = self.config.verbosity;
        let budget = iteration_budget(self.model, self.config);
        log_changes!(verbosity, "Optimizing with up to {} restarts", budget);

        let baseline = StrictBuilder::new(self.model, self.config).build();
        let strict_coverage = baseline.coverage();
        let mut best = Candidate {
            iteration: 0,
            filled: baseline.schedule.filled_slots(),
            balance: self.validator.validate(self.model, &baseline.schedule),
            schedule: baseline.schedule.clone(),
            relaxations: Vec::new(),
        };

        let mut iterations_run = 0;
        let mut discarded = 0;
        let mut stalled = 0;
        let mut stop_reason = StopReason::BudgetExhausted;
        let mut next = 1;

        if best.target_reached() {
            stop_reason = StopReason::TargetReached;
            next = budget + 1;
        }

        'batches: while next <= budget {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                stop_reason = StopReason::Cancelled;
                break;
            }
            let batch: Vec<usize> = (next..=budget.min(next + BATCH_SIZE - 1)).collect();
            next += batch.len();

            let results: Vec<Result<Candidate, IterationError>> = if self.config.parallel {
                batch
                    .par_iter()
                    .map(|&i| self.run_iteration(i, &baseline))
                    .collect()
            } else {
                batch
                    .iter()
                    .map(|&i| self.run_iteration(i, &baseline))
                    .collect()
            };

            for result in results {
                iterations_run += 1;
                match result {
                    Ok(candidate) if candidate.beats(&best) => {
                        log_checks!(
                            verbosity,
                            "  Restart {}: {} filled, score {:.1} (new best)",
                            candidate.iteration,
                            candidate.filled,
                            candidate.balance.score
                        );
                        best = candidate;
                        stalled = 0;
                    }
                    Ok(_) => stalled += 1,
                    Err(err) => {
                        tracing::warn!("Discarding restart: {}", err);
                        discarded += 1;
                        stalled += 1;
                    }
                }

                if best.target_reached() {
                    stop_reason = StopReason::TargetReached;
                    break 'batches;
                }
                if self.config.stall_limit > 0 && stalled >= self.config.stall_limit {
                    stop_reason = StopReason::Stalled;
                    break 'batches;
                }
            }
        }

        self.finish(best, strict_coverage, iterations_run, discarded, stop_reason)
    }

    fn run_iteration(
        &self,
        iteration: usize,
        baseline: &StrictDistribution,
    ) -> Result<Candidate, IterationError> {
        let strict = if iteration == 1 {
            baseline.clone()
        } else {
            StrictBuilder::new(self.model, self.config)
                .perturbed(self.config.seed.wrapping_add(iteration as u64))
                .build()
        };

        let before = strict.schedule.filled_slots();
        let mut schedule = strict.schedule;
        let summary = Repairer::new(self.model, self.config).run(&mut schedule);
        let after = schedule.filled_slots();
        if after < before {
            return Err(IterationError::CoverageRegressed {
                iteration,
                before,
                after,
            });
        }

        if let Some(violation) = audit(self.model, &schedule)
            .into_iter()
            .find(|v| v.is_critical())
        {
            return Err(IterationError::HardRuleBroken {
                iteration,
                violation: violation.to_string(),
            });
        }

        Ok(Candidate {
            iteration,
            balance: self.validator.validate(self.model, &schedule),
            schedule,
            relaxations: summary.relaxations,
            filled: after,
        })
    }

    fn finish(
        &self,
        best: Candidate,
        strict_coverage: f64,
        iterations_run: usize,
        discarded: usize,
        stop_reason: StopReason,
    ) -> OptimizationOutcome {
        let targets: Vec<u32> = self.model.profiles().iter().map(|p| p.target).collect();
        let ctx = RuleContext::strict(self.model);
        let unfilled: Vec<InfeasibleSlot> = best
            .schedule
            .empty_slots()
            .into_iter()
            .map(|(day, slot)| diagnose(&ctx, &best.schedule, day, slot, &targets))
            .collect();
        let coverage = best.schedule.coverage();

        let exhausted = if unfilled.is_empty() {
            None
        } else {
            for gap in &unfilled {
                log_changes!(
                    self.config.verbosity,
                    "  {} slot {} empty, mostly blocked by {}",
                    gap.date,
                    gap.slot,
                    gap.dominant_rule().map_or("target caps", |rule| rule.name())
                );
            }
            let err = RelaxationExhausted {
                coverage,
                unfilled: unfilled.clone(),
            };
            tracing::warn!("{}", err);
            Some(err)
        };

        log_changes!(
            self.config.verbosity,
            "Optimization finished ({:?}): coverage {:.1}% (strict {:.1}%), score {:.1}, restart {}",
            stop_reason,
            coverage * 100.0,
            strict_coverage * 100.0,
            best.balance.score,
            best.iteration
        );

        OptimizationOutcome {
            schedule: best.schedule,
            balance: best.balance,
            relaxations: best.relaxations,
            unfilled,
            coverage,
            strict_coverage,
            iterations_run,
            best_iteration: best.iteration,
            discarded,
            stop_reason,
            exhausted,
        }
    }
}
