//! Convergence driver: observe, plan, apply, repeat.
//!
//! Failed steps are not retried here. The next pass re-observes the engine
//! and the planner re-emits an equivalent step if the condition persists.

use tracing::{info, warn};

use crate::app::Application;
use crate::infrastructure::Engine;
use crate::types::config::Settings;
use crate::types::service::ServiceStatus;
use crate::types::step::{is_settled, CompositionStep};

use super::context::ReconcileContext;
use super::dedupe::StartDedupe;
use super::{planner, teardown};

/// Outcome of a convergence run.
#[derive(Debug, Clone)]
pub struct ConvergenceReport {
    /// Every batch the planner produced, in order.
    pub batches: Vec<Vec<CompositionStep>>,
    pub failed: Vec<(CompositionStep, String)>,
    pub passes: u32,
    /// The final pass produced no steps at all.
    pub converged: bool,
}

impl ConvergenceReport {
    pub fn applied_steps(&self) -> usize {
        self.batches.iter().map(Vec::len).sum::<usize>() - self.failed.len()
    }
}

/// Runs the planner against an engine until nothing is left to do.
pub struct ConvergenceDriver {
    settings: Settings,
}

impl ConvergenceDriver {
    pub fn new(max_passes: u32) -> Self {
        Self::from_settings(&Settings {
            max_passes,
            ..Settings::default()
        })
    }

    pub fn from_settings(settings: &Settings) -> Self {
        ConvergenceDriver {
            settings: settings.clone(),
        }
    }

    /// Converge the engine's app toward `target`.
    pub fn converge(
        &self,
        target: &Application,
        engine: &mut dyn Engine,
        dedupe: &mut dyn StartDedupe,
    ) -> ConvergenceReport {
        self.run(engine, dedupe, |current, ctx, dedupe| {
            planner::compute_next_steps(current, target, ctx, dedupe)
        })
    }

    /// Remove the engine's app entirely.
    pub fn remove(&self, engine: &mut dyn Engine, dedupe: &mut dyn StartDedupe) -> ConvergenceReport {
        self.run(engine, dedupe, |current, ctx, _| {
            teardown::compute_removal_steps(current, ctx)
        })
    }

    fn context_for(&self, engine: &dyn Engine) -> ReconcileContext {
        let mut ctx = engine.context();
        ctx.local_mode |= self.settings.local_mode;
        ctx.default_update_strategy = self.settings.default_update_strategy;
        ctx
    }

    fn run<F>(&self, engine: &mut dyn Engine, dedupe: &mut dyn StartDedupe, plan: F) -> ConvergenceReport
    where
        F: Fn(&Application, &ReconcileContext, &dyn StartDedupe) -> Vec<CompositionStep>,
    {
        let mut report = ConvergenceReport {
            batches: Vec::new(),
            failed: Vec::new(),
            passes: 0,
            converged: false,
        };

        while report.passes < self.settings.max_passes {
            report.passes += 1;
            let current = engine.observe();
            confirm_running(&current, dedupe);
            let ctx = self.context_for(engine);
            let steps = plan(&current, &ctx, &*dedupe);

            if steps.is_empty() {
                report.converged = true;
                info!(passes = report.passes, "converged");
                break;
            }
            info!(
                pass = report.passes,
                steps = steps.len(),
                settled = is_settled(&steps),
                "applying batch"
            );

            for step in &steps {
                if let Err(e) = engine.apply(step, dedupe) {
                    warn!(step = %step.describe(), error = %e, "step failed");
                    report.failed.push((step.clone(), e.to_string()));
                }
            }
            report.batches.push(steps);
        }

        if !report.converged {
            warn!(passes = report.passes, "pass limit reached before convergence");
        }
        report
    }
}

/// Start requests for containers now observed running are settled.
fn confirm_running(current: &Application, dedupe: &mut dyn StartDedupe) {
    for svc in &current.services {
        if !svc.has_status(ServiceStatus::Running) {
            continue;
        }
        if let Some(id) = svc.container_id.as_deref() {
            dedupe.confirm_started(id, svc.config.restart);
        }
    }
}
