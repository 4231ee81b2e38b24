//! Invoice lifecycle reconciliation.

mod engine;
mod locks;
mod rules;

pub use engine::{ReconcileOutcome, ReconcileResult, ReconciliationEngine, MAX_APPLY_ATTEMPTS};
pub use locks::OrderLocks;
pub use rules::{decide, Decision, PlannedTransition, SkipReason};
