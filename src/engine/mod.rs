//! Orchestration engine
//!
//! The engine ties a run together:
//! 1. Planning - Select requested services and order them by dependency
//! 2. Executing - Reconcile each reachable service, recording outcomes

pub mod executor;
pub mod planner;

pub use executor::execute;
pub use planner::{ExecutionPlan, parse_services};
