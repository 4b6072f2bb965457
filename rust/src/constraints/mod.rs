//! Constraint model, hard rules and the eligibility evaluator.

mod audit;
mod eligibility;
mod model;
mod rules;
mod violation;

pub use audit::audit;
pub use eligibility::{blocking_reasons, check_rules, is_eligible};
pub use model::{ConfigurationError, ConstraintModel, WorkerProfile};
pub(crate) use rules::shift_day;
pub use rules::{BlockReason, HardRule, RuleContext, PATTERN_OFFSETS};
pub use violation::{has_critical, ConstraintViolation, Severity, ViolationKind};
