//! Schedule construction: strict distribution followed by iterative optimization.
//!
//! The strict builder never bends a hard rule and accepts partial coverage.
//! The optimizer restarts it with perturbed priorities and repairs each
//! result with bounded soft-constraint relaxation, keeping the best.

mod iterations;
mod optimizer;
mod priority;
mod relaxation;
mod state;
mod strict;

pub use iterations::{complexity, iteration_budget, MIN_ADAPTIVE_ITERATIONS};
pub use optimizer::{
    CancellationToken, IterationError, IterativeOptimizer, OptimizationOutcome,
    RelaxationExhausted, StopReason,
};
pub use priority::{priority_score, rank_candidates, CandidateKey, PriorityContext};
pub use relaxation::{target_cap, Relaxation, RelaxationLevel, RepairSummary, Repairer};
pub use state::{DecisionPoint, SearchState};
pub use strict::{diagnose, Blocker, InfeasibleSlot, StrictBuilder, StrictDistribution, MANDATORY_RULES};
