//! Execution engines for composition steps.
//!
//! Provides the `Engine` trait the convergence driver talks to and a
//! simulated implementation (testing, dry runs). A real container-engine
//! backend lives outside this crate and implements the same trait.

pub mod simulated;

use crate::app::Application;
use crate::convergence::context::ReconcileContext;
use crate::convergence::dedupe::StartDedupe;
use crate::error::EngineError;
use crate::types::step::CompositionStep;

/// Applies steps against a container engine and reports what it observes.
pub trait Engine {
    /// Apply one step. Starts are recorded in `dedupe`; removals clear it.
    fn apply(&mut self, step: &CompositionStep, dedupe: &mut dyn StartDedupe) -> Result<(), EngineError>;

    /// The app as currently observed on the device.
    fn observe(&self) -> Application;

    /// Images, downloads and container ids known to the engine.
    fn context(&self) -> ReconcileContext;
}

#[cfg(test)]
mod tests {
    use super::simulated::SimulatedEngine;
    use super::*;

    #[test]
    fn simulated_implements_engine() {
        let engine = SimulatedEngine::new(1);
        let _: &dyn Engine = &engine;
    }
}
