//! Simulated engine for tests and dry runs.
//!
//! Applies steps to an in-memory device state. Every transition completes
//! immediately, so a kill removes the container in one go. Failures can be
//! injected per action to exercise the driver's re-diff behaviour.

use std::collections::HashMap;

use crate::app::Application;
use crate::convergence::context::ReconcileContext;
use crate::convergence::dedupe::StartDedupe;
use crate::convergence::dependencies::{network_dependents, volume_dependents};
use crate::error::EngineError;
use crate::types::image::ImageRef;
use crate::types::service::{Service, ServiceStatus};
use crate::types::step::{CompositionStep, StepAction};

use super::Engine;

/// A test-double device that records every applied step.
pub struct SimulatedEngine {
    app: Application,
    context: ReconcileContext,
    /// Steps applied successfully, in order.
    pub applied: Vec<CompositionStep>,
    failures: HashMap<StepAction, u32>,
    next_container: u64,
}

impl SimulatedEngine {
    /// An empty device for the given app.
    pub fn new(app_id: u32) -> Self {
        Self::with_state(Application::current(app_id), ReconcileContext::new())
    }

    /// A device already holding some state.
    pub fn with_state(app: Application, context: ReconcileContext) -> Self {
        SimulatedEngine {
            app,
            context,
            applied: Vec::new(),
            failures: HashMap::new(),
            next_container: 1,
        }
    }

    /// Make the next `times` steps with this action fail.
    pub fn fail_next(&mut self, action: StepAction, times: u32) {
        *self.failures.entry(action).or_insert(0) += times;
    }

    pub fn add_image(&mut self, image: ImageRef) {
        if !self.context.available_images.contains(&image) {
            self.context.available_images.push(image);
        }
    }

    /// Count of applied steps with the given action.
    pub fn applied_count(&self, action: StepAction) -> usize {
        self.applied.iter().filter(|s| s.action() == action).count()
    }

    fn take_failure(&mut self, action: StepAction) -> bool {
        match self.failures.get_mut(&action) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    fn container_index(&self, svc: &Service) -> Result<usize, EngineError> {
        svc.container_id
            .as_deref()
            .and_then(|id| {
                self.app
                    .services
                    .iter()
                    .position(|s| s.container_id.as_deref() == Some(id))
            })
            .ok_or_else(|| EngineError::UnknownService(svc.service_name.clone()))
    }

    fn remove_container(&mut self, svc: &Service, dedupe: &mut dyn StartDedupe) -> Result<(), EngineError> {
        let idx = self.container_index(svc)?;
        let removed = self.app.services.remove(idx);
        if let Some(id) = removed.container_id.as_deref() {
            dedupe.clear(id);
            self.context.container_ids.retain(|_, v| v != id);
        }
        Ok(())
    }

    fn start(
        &mut self,
        current: Option<&Service>,
        target: &Service,
        dedupe: &mut dyn StartDedupe,
    ) -> Result<(), EngineError> {
        if !self.context.is_image_available(target) {
            return Err(EngineError::step_failed(StepAction::Start, "image not available"));
        }
        if let Some(network) = target.config.networks.iter().find(|n| !self.app.has_network(n)) {
            return Err(EngineError::step_failed(
                StepAction::Start,
                format!("network '{}' does not exist", network),
            ));
        }
        if let Some(volume) = target.named_volumes().find(|v| !self.app.has_volume(v)) {
            return Err(EngineError::step_failed(
                StepAction::Start,
                format!("volume '{}' does not exist", volume),
            ));
        }
        let status = if target.is_running() {
            ServiceStatus::Running
        } else {
            ServiceStatus::Stopped
        };

        let id = match current {
            Some(existing) => {
                let idx = self.container_index(existing)?;
                let svc = &mut self.app.services[idx];
                svc.config = target.config.clone();
                svc.status = Some(status);
                svc.container_id.clone().unwrap_or_default()
            }
            None => {
                let id = format!("sim-{}", self.next_container);
                self.next_container += 1;
                let mut svc = target.clone();
                svc.status = Some(status);
                svc.container_id = Some(id.clone());
                self.app.services.push(svc);
                id
            }
        };

        self.context
            .container_ids
            .insert(target.service_name.clone(), id.clone());
        if target.is_running() {
            dedupe.set(&id);
        }
        Ok(())
    }
}

impl Engine for SimulatedEngine {
    fn apply(&mut self, step: &CompositionStep, dedupe: &mut dyn StartDedupe) -> Result<(), EngineError> {
        let action = step.action();
        if self.take_failure(action) {
            return Err(EngineError::step_failed(action, "simulated failure"));
        }

        match step {
            CompositionStep::CreateNetwork { target } => {
                self.app.networks.insert(target.name.clone(), target.clone());
            }
            CompositionStep::RemoveNetwork { current } => {
                if network_dependents(&self.app, &current.name).next().is_some() {
                    return Err(EngineError::step_failed(action, "network in use"));
                }
                self.app.networks.remove(&current.name);
            }
            CompositionStep::CreateVolume { target } => {
                self.app.volumes.insert(target.name.clone(), target.clone());
            }
            CompositionStep::RemoveVolume { current } => {
                if volume_dependents(&self.app, &current.name).next().is_some() {
                    return Err(EngineError::step_failed(action, "volume in use"));
                }
                self.app.volumes.remove(&current.name);
            }
            CompositionStep::Kill {
                current,
                remove_image,
            } => {
                self.remove_container(current, dedupe)?;
                if *remove_image {
                    self.context.available_images.retain(|img| !img.provides(current));
                }
            }
            CompositionStep::Remove { current } => {
                self.remove_container(current, dedupe)?;
            }
            CompositionStep::Stop { current } => {
                let idx = self.container_index(current)?;
                let svc = &mut self.app.services[idx];
                svc.config.running = false;
                svc.status = Some(ServiceStatus::Stopped);
                if let Some(id) = svc.container_id.as_deref() {
                    dedupe.clear(id);
                }
            }
            CompositionStep::Start { current, target } => {
                self.start(current.as_ref(), target, dedupe)?;
            }
            CompositionStep::Fetch { image, .. } => {
                self.context.downloading.retain(|id| *id != image.image_id);
                self.add_image(image.clone());
            }
            CompositionStep::UpdateMetadata { current, target } => {
                let idx = self.container_index(current)?;
                let svc = &mut self.app.services[idx];
                svc.release_id = target.release_id;
                svc.image_id = target.image_id;
                svc.service_id = target.service_id;
            }
            CompositionStep::Noop => {}
        }

        self.applied.push(step.clone());
        Ok(())
    }

    fn observe(&self) -> Application {
        self.app.clone()
    }

    fn context(&self) -> ReconcileContext {
        self.context.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::dedupe::InMemoryStartDedupe;
    use crate::types::network::Network;
    use crate::types::service::fixtures::service;

    fn started(engine: &mut SimulatedEngine, dedupe: &mut InMemoryStartDedupe, svc: &Service) {
        engine
            .apply(
                &CompositionStep::CreateNetwork {
                    target: Network::default_for(1),
                },
                dedupe,
            )
            .unwrap();
        engine.add_image(ImageRef::for_service(svc));
        engine
            .apply(
                &CompositionStep::Start {
                    current: None,
                    target: svc.clone(),
                },
                dedupe,
            )
            .unwrap();
    }

    #[test]
    fn start_creates_running_container() {
        let mut engine = SimulatedEngine::new(1);
        let mut dedupe = InMemoryStartDedupe::new();
        started(&mut engine, &mut dedupe, &service("main", "image1"));

        let app = engine.observe();
        assert_eq!(app.services.len(), 1);
        assert_eq!(app.services[0].status, Some(ServiceStatus::Running));
        assert_eq!(engine.context().container_id("main"), Some("sim-1"));
        assert!(dedupe.has("sim-1"));
    }

    #[test]
    fn start_without_image_fails() {
        let mut engine = SimulatedEngine::new(1);
        let mut dedupe = InMemoryStartDedupe::new();
        let step = CompositionStep::Start {
            current: None,
            target: service("main", "image1"),
        };
        let err = engine.apply(&step, &mut dedupe).unwrap_err();
        assert_eq!(err, EngineError::step_failed(StepAction::Start, "image not available"));
        assert!(engine.applied.is_empty());
    }

    #[test]
    fn start_without_network_fails() {
        let mut engine = SimulatedEngine::new(1);
        let mut dedupe = InMemoryStartDedupe::new();
        let svc = service("main", "image1");
        engine.add_image(ImageRef::for_service(&svc));
        let step = CompositionStep::Start {
            current: None,
            target: svc,
        };
        let err = engine.apply(&step, &mut dedupe).unwrap_err();
        assert_eq!(
            err,
            EngineError::step_failed(StepAction::Start, "network 'default' does not exist")
        );
        assert!(engine.observe().services.is_empty());
    }

    #[test]
    fn stop_clears_start_request() {
        let mut engine = SimulatedEngine::new(1);
        let mut dedupe = InMemoryStartDedupe::new();
        started(&mut engine, &mut dedupe, &service("main", "image1"));
        let current = engine.observe().services[0].clone();
        engine
            .apply(&CompositionStep::Stop { current }, &mut dedupe)
            .unwrap();
        assert!(!dedupe.has("sim-1"));
        assert_eq!(engine.observe().services[0].status, Some(ServiceStatus::Stopped));
    }

    #[test]
    fn kill_removes_container_and_clears_dedupe() {
        let mut engine = SimulatedEngine::new(1);
        let mut dedupe = InMemoryStartDedupe::new();
        started(&mut engine, &mut dedupe, &service("main", "image1"));
        let current = engine.observe().services[0].clone();

        engine
            .apply(
                &CompositionStep::Kill {
                    current,
                    remove_image: true,
                },
                &mut dedupe,
            )
            .unwrap();
        assert!(engine.observe().services.is_empty());
        assert!(dedupe.is_empty());
        assert!(engine.context().available_images.is_empty());
        assert!(engine.context().container_ids.is_empty());
    }

    #[test]
    fn network_in_use_cannot_be_removed() {
        let mut engine = SimulatedEngine::new(1);
        let mut dedupe = InMemoryStartDedupe::new();
        engine
            .apply(
                &CompositionStep::CreateNetwork {
                    target: Network::default_for(1),
                },
                &mut dedupe,
            )
            .unwrap();
        started(&mut engine, &mut dedupe, &service("main", "image1"));
        let err = engine
            .apply(
                &CompositionStep::RemoveNetwork {
                    current: Network::default_for(1),
                },
                &mut dedupe,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::StepFailed { action: StepAction::RemoveNetwork, .. }));
    }

    #[test]
    fn injected_failures_are_consumed() {
        let mut engine = SimulatedEngine::new(1);
        let mut dedupe = InMemoryStartDedupe::new();
        engine.fail_next(StepAction::Noop, 1);
        assert!(engine.apply(&CompositionStep::Noop, &mut dedupe).is_err());
        assert!(engine.apply(&CompositionStep::Noop, &mut dedupe).is_ok());
        assert_eq!(engine.applied_count(StepAction::Noop), 1);
    }

    #[test]
    fn unknown_container_is_reported() {
        let mut engine = SimulatedEngine::new(1);
        let mut dedupe = InMemoryStartDedupe::new();
        let err = engine
            .apply(&CompositionStep::Stop { current: service("ghost", "x") }, &mut dedupe)
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownService("ghost".into()));
    }
}
