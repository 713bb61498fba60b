//! convoy-core: the reconciliation engine of an edge-device container
//! supervisor.
//!
//! Given an observed `Application` and a target one, the planner emits the
//! next batch of `CompositionStep`s. Callers execute the batch, observe the
//! device again and repeat until a batch comes back empty.

pub mod app;
pub mod compose;
pub mod convergence;
pub mod data;
pub mod error;
pub mod infrastructure;
pub mod types;

pub use app::Application;
pub use convergence::{
    compute_next_steps, compute_removal_steps, ConvergenceDriver, ConvergenceReport,
    InMemoryStartDedupe, ReconcileContext, StartDedupe, UpdateStrategy,
};
pub use error::{ConfigurationError, EngineError, LoadError, SettingsError};
pub use infrastructure::simulated::SimulatedEngine;
pub use infrastructure::Engine;
pub use types::config::Settings;
pub use types::step::{CompositionStep, StepAction};
