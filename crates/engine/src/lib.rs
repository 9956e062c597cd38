//! Threshold evaluation engine: rule configuration, per-patient state with
//! TTL eviction, and the deterministic alert decision core.

pub mod engine;
pub mod rules;
pub mod state;

pub use engine::{AlertDecision, ThresholdEngine};
pub use rules::{RuleError, RuleSet, ThresholdCheck, ViolationKind};
pub use state::{spawn_sweeper, EntityState, StateStore, SweeperHandle};
