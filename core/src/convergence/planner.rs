//! Step planner: diffs current vs target app state into one batch of steps.
//!
//! The planner is stateless: it takes the observed and desired apps plus the
//! execution context and returns the steps for one convergence increment. It
//! never executes anything. Applying a batch changes the world, so the caller
//! re-observes and asks again until the batch is empty (or only `noop`s).
//!
//! Batch order:
//! 1. Networks: create missing, remove stale ones nobody uses
//! 2. Volumes: same as networks
//! 3. Kill services that block a stale network or volume
//! 4. Retire services the target no longer has
//! 5. Converge matching services (metadata, run state, update strategy)
//! 6. Fetch or start services new to the device

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::app::Application;
use crate::types::image::ImageRef;
use crate::types::network::Network;
use crate::types::service::{Service, ServiceStatus};
use crate::types::step::CompositionStep;
use crate::types::volume::Volume;
use crate::types::Component;

use super::context::ReconcileContext;
use super::dedupe::StartDedupe;
use super::dependencies::{dependencies_met_for_kill, dependencies_met_for_start};
use super::strategy::{resolve_phase, Readiness, UpdatePhase, UpdateStrategy};

/// Compute the next batch of steps converging `current` toward `target`.
///
/// A target without a `default` network is treated as if it declared one.
/// Divergence is always expressed as steps; this function cannot fail.
pub fn compute_next_steps(
    current: &Application,
    target: &Application,
    context: &ReconcileContext,
    dedupe: &dyn StartDedupe,
) -> Vec<CompositionStep> {
    let target = target.with_default_network();
    let plan = Planning {
        current,
        target: target.as_ref(),
        context,
        dedupe,
    };
    let services = ServiceDiff::compute(current, plan.target);
    let mut batch = Batch::default();

    plan_resources(&mut batch, &current.networks, &plan.target.networks, &plan, &services);
    plan_resources(&mut batch, &current.volumes, &plan.target.volumes, &plan, &services);

    for old in &services.obsolete {
        let step = if plan.hand_over_pending(old) {
            CompositionStep::Noop
        } else {
            retire_service(old)
        };
        batch.push(step);
    }

    for (existing, wanted) in &services.matched {
        let step = match existing {
            Some(existing) => plan.step_for_pair(existing, wanted),
            None => plan.step_for_install(wanted),
        };
        if let Some(step) = step {
            batch.push(step);
        }
    }

    let steps = batch.finish();
    debug!(app_id = current.app_id, steps = steps.len(), "computed next steps");
    steps
}

// ---------------------------------------------------------------------------
// Service pairing
// ---------------------------------------------------------------------------

/// Current services matched against target services by name.
struct ServiceDiff<'a> {
    /// In target order; `None` when the target service is new to the device.
    matched: Vec<(Option<&'a Service>, &'a Service)>,
    /// Current services no target service claims.
    obsolete: Vec<&'a Service>,
}

impl<'a> ServiceDiff<'a> {
    fn compute(current: &'a Application, target: &'a Application) -> Self {
        let mut claimed = HashSet::new();
        let mut matched = Vec::with_capacity(target.services.len());

        for wanted in &target.services {
            let candidates: Vec<usize> = current
                .services
                .iter()
                .enumerate()
                .filter(|(_, s)| s.service_name == wanted.service_name)
                .map(|(i, _)| i)
                .collect();
            // Prefer the instance already on the target release.
            let pick = candidates
                .iter()
                .copied()
                .find(|&i| current.services[i].release_id == wanted.release_id)
                .or_else(|| candidates.first().copied());
            match pick {
                Some(i) => {
                    claimed.insert(i);
                    matched.push((Some(&current.services[i]), wanted));
                }
                None => matched.push((None, wanted)),
            }
        }

        let obsolete = current
            .services
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed.contains(i))
            .map(|(_, s)| s)
            .collect();

        ServiceDiff { matched, obsolete }
    }

    /// Whether service convergence or obsolescence already decides this
    /// current service's next step.
    fn is_changing(&self, svc: &Service) -> bool {
        if self.obsolete.iter().any(|s| std::ptr::eq(*s, svc)) {
            return true;
        }
        self.matched.iter().any(|(existing, wanted)| match existing {
            Some(existing) => std::ptr::eq(*existing, svc) && !is_unchanged(existing, wanted),
            None => false,
        })
    }
}

fn is_unchanged(current: &Service, target: &Service) -> bool {
    current.is_equal_config(target) && current.has_same_metadata(target)
}

/// Step that gets a current container out of the way.
fn retire_service(svc: &Service) -> CompositionStep {
    match svc.status {
        Some(ServiceStatus::Stopping) => CompositionStep::Noop,
        Some(ServiceStatus::Dead) => CompositionStep::Remove {
            current: svc.clone(),
        },
        _ => CompositionStep::Kill {
            current: svc.clone(),
            remove_image: false,
        },
    }
}

// ---------------------------------------------------------------------------
// Networks and volumes
// ---------------------------------------------------------------------------

trait Resource: Component + Clone {
    fn create_step(&self) -> CompositionStep;
    fn remove_step(&self) -> CompositionStep;
    fn is_used_by(&self, svc: &Service) -> bool;
}

impl Resource for Network {
    fn create_step(&self) -> CompositionStep {
        CompositionStep::CreateNetwork {
            target: self.clone(),
        }
    }

    fn remove_step(&self) -> CompositionStep {
        CompositionStep::RemoveNetwork {
            current: self.clone(),
        }
    }

    fn is_used_by(&self, svc: &Service) -> bool {
        svc.uses_network(&self.name)
    }
}

impl Resource for Volume {
    fn create_step(&self) -> CompositionStep {
        CompositionStep::CreateVolume {
            target: self.clone(),
        }
    }

    fn remove_step(&self) -> CompositionStep {
        CompositionStep::RemoveVolume {
            current: self.clone(),
        }
    }

    fn is_used_by(&self, svc: &Service) -> bool {
        svc.uses_volume(&self.name)
    }
}

/// A config change is a removal now and a creation on a later pass, since
/// the engine cannot reconfigure a network or volume in place.
fn plan_resources<R: Resource>(
    batch: &mut Batch,
    existing: &BTreeMap<String, R>,
    wanted: &BTreeMap<String, R>,
    plan: &Planning<'_>,
    services: &ServiceDiff<'_>,
) {
    for (name, target) in wanted {
        match existing.get(name) {
            None => batch.push(target.create_step()),
            Some(current) if !current.is_equal_config(target) => {
                retire_resource(batch, current, plan, services)
            }
            Some(_) => {}
        }
    }
    for (name, current) in existing {
        if !wanted.contains_key(name) {
            retire_resource(batch, current, plan, services);
        }
    }
}

fn retire_resource<R: Resource>(
    batch: &mut Batch,
    resource: &R,
    plan: &Planning<'_>,
    services: &ServiceDiff<'_>,
) {
    let dependents: Vec<&Service> = plan
        .current
        .services
        .iter()
        .filter(|s| resource.is_used_by(s))
        .collect();

    if dependents.is_empty() {
        batch.push(resource.remove_step());
        return;
    }

    debug!(
        resource = resource.name(),
        dependents = dependents.len(),
        "removal deferred until dependents are gone"
    );
    for svc in dependents {
        if !services.is_changing(svc) {
            batch.push(retire_service(svc));
        }
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

struct Planning<'a> {
    current: &'a Application,
    target: &'a Application,
    context: &'a ReconcileContext,
    dedupe: &'a dyn StartDedupe,
}

impl Planning<'_> {
    fn fallback_strategy(&self) -> UpdateStrategy {
        self.context.default_update_strategy
    }

    fn step_for_pair(&self, current: &Service, target: &Service) -> Option<CompositionStep> {
        match current.status {
            // A kill is already under way.
            Some(ServiceStatus::Stopping) => return Some(CompositionStep::Noop),
            Some(ServiceStatus::Dead) => {
                return Some(CompositionStep::Remove {
                    current: current.clone(),
                })
            }
            _ => {}
        }

        if is_unchanged(current, target) {
            return quiescence(current);
        }

        let needs_download = !self.context.is_image_available(target);
        if needs_download && self.context.is_downloading(target) {
            return Some(CompositionStep::Noop);
        }

        if current.is_equal_except_running(target) {
            if !current.has_same_metadata(target) {
                return Some(CompositionStep::UpdateMetadata {
                    current: current.clone(),
                    target: target.clone(),
                });
            }
            return self.run_state_step(current, target);
        }

        let readiness = Readiness {
            needs_download: needs_download && !self.context.local_mode,
            ready_for_kill: dependencies_met_for_kill(self.target, self.context),
            ready_for_start: !needs_download
                && dependencies_met_for_start(target, self.current, self.target, self.context)
                && !self.hand_over_start_requested(current, target),
        };
        let step = match resolve_phase(current, target, readiness, self.fallback_strategy()) {
            UpdatePhase::Fetch => fetch_step(target),
            UpdatePhase::Kill { remove_image } => CompositionStep::Kill {
                current: current.clone(),
                remove_image,
            },
            UpdatePhase::BringUp => CompositionStep::Start {
                current: None,
                target: target.clone(),
            },
            UpdatePhase::Wait => CompositionStep::Noop,
        };
        Some(step)
    }

    /// Start or stop a container whose config already matches.
    fn run_state_step(&self, current: &Service, target: &Service) -> Option<CompositionStep> {
        if target.is_running() && !current.is_running() {
            if self.start_requested(Some(current), target) {
                debug!(service = %target.service_name, "start already requested");
                return quiescence(current);
            }
            if !dependencies_met_for_start(target, self.current, self.target, self.context) {
                return quiescence(current);
            }
            return Some(CompositionStep::Start {
                current: Some(current.clone()),
                target: target.clone(),
            });
        }
        if !target.is_running() && current.is_running() {
            return Some(CompositionStep::Stop {
                current: current.clone(),
            });
        }
        quiescence(current)
    }

    /// Fetch or start a service with no container on the device.
    fn step_for_install(&self, target: &Service) -> Option<CompositionStep> {
        if !self.context.is_image_available(target) {
            if self.context.local_mode || self.context.is_downloading(target) {
                return Some(CompositionStep::Noop);
            }
            return Some(fetch_step(target));
        }
        if self.start_requested(None, target) {
            // Requested but not yet reported by the engine.
            return Some(CompositionStep::Noop);
        }
        if !dependencies_met_for_start(target, self.current, self.target, self.context) {
            debug!(service = %target.service_name, "start gated on dependencies");
            return None;
        }
        Some(CompositionStep::Start {
            current: None,
            target: target.clone(),
        })
    }

    fn start_requested(&self, current: Option<&Service>, target: &Service) -> bool {
        current
            .and_then(|c| c.container_id.as_deref())
            .or_else(|| self.context.container_id(&target.service_name))
            .map_or(false, |id| self.dedupe.has(id))
    }

    /// During a hand-over the context maps the name to whichever container
    /// the engine started last; the old container's own entry does not count.
    fn hand_over_start_requested(&self, current: &Service, target: &Service) -> bool {
        self.context
            .container_id(&target.service_name)
            .filter(|id| Some(*id) != current.container_id.as_deref())
            .map_or(false, |id| self.dedupe.has(id))
    }

    /// An obsolete old instance is kept while its hand-over replacement is
    /// not running yet.
    fn hand_over_pending(&self, old: &Service) -> bool {
        if matches!(
            old.status,
            Some(ServiceStatus::Dead) | Some(ServiceStatus::Stopping)
        ) {
            return false;
        }
        let Some(target) = self.target.service(&old.service_name) else {
            return false;
        };
        if UpdateStrategy::for_service(target, self.fallback_strategy()) != UpdateStrategy::HandOver {
            return false;
        }
        self.current
            .services_named(&old.service_name)
            .any(|s| !std::ptr::eq(s, old) && s.release_id == target.release_id && !s.has_status(ServiceStatus::Running))
    }
}

fn fetch_step(target: &Service) -> CompositionStep {
    CompositionStep::Fetch {
        image: ImageRef::for_service(target),
        service_name: target.service_name.clone(),
    }
}

/// Keep the caller looping while the engine is mid-transition.
fn quiescence(current: &Service) -> Option<CompositionStep> {
    match current.status {
        Some(status) if status.is_transitional() => Some(CompositionStep::Noop),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Batch {
    steps: Vec<CompositionStep>,
}

impl Batch {
    /// Add a step unless an identical one is already queued.
    fn push(&mut self, step: CompositionStep) {
        if self.steps.contains(&step) {
            return;
        }
        debug!(step = %step.describe(), "planned");
        self.steps.push(step);
    }

    /// A service leaving the device this batch gets no fetch or start in it.
    /// The rest is ordered creates first, service steps next (dependent
    /// kills were queued ahead of the others), resource removals last.
    fn finish(self) -> Vec<CompositionStep> {
        let retired: HashSet<String> = self
            .steps
            .iter()
            .filter(|s| matches!(s, CompositionStep::Kill { .. } | CompositionStep::Remove { .. }))
            .filter_map(|s| s.service_name().map(str::to_string))
            .collect();
        let mut steps: Vec<CompositionStep> = self
            .steps
            .into_iter()
            .filter(|s| {
                let bring_up = matches!(s, CompositionStep::Start { .. } | CompositionStep::Fetch { .. });
                let blocked = bring_up && s.service_name().map_or(false, |n| retired.contains(n));
                if blocked {
                    debug!(step = %s.describe(), "deferred behind teardown");
                }
                !blocked
            })
            .collect();
        steps.sort_by_key(batch_phase);
        steps
    }
}

fn batch_phase(step: &CompositionStep) -> u8 {
    match step {
        CompositionStep::CreateNetwork { .. } | CompositionStep::CreateVolume { .. } => 0,
        CompositionStep::RemoveNetwork { .. } | CompositionStep::RemoveVolume { .. } => 2,
        _ => 1,
    }
}
