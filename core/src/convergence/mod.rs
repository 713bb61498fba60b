//! Convergence engine: diffs current against target state and produces steps.
//!
//! `planner` computes one batch of steps toward the target and `teardown`
//! one batch toward an empty device. `strategy` and `dependencies` decide
//! when an individual service may move. `driver` repeats observe, plan and
//! apply against an `Engine` until a batch comes back empty.

pub mod context;
pub mod dedupe;
pub mod dependencies;
pub mod driver;
pub mod planner;
pub mod strategy;
pub mod teardown;

pub use context::ReconcileContext;
pub use dedupe::{InMemoryStartDedupe, StartDedupe};
pub use driver::{ConvergenceDriver, ConvergenceReport};
pub use planner::compute_next_steps;
pub use strategy::UpdateStrategy;
pub use teardown::compute_removal_steps;
