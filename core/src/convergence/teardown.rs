//! Teardown planner: steps removing an app from the device.
//!
//! Containers go first. Volumes and networks are only removed on a pass
//! where no container remains, so nothing still references them.

use tracing::debug;

use crate::app::Application;
use crate::types::service::ServiceStatus;
use crate::types::step::CompositionStep;

use super::context::ReconcileContext;

/// Compute the next batch of steps removing `current` entirely.
///
/// In local mode volumes are kept so development data survives removing
/// and re-pushing the app.
pub fn compute_removal_steps(
    current: &Application,
    context: &ReconcileContext,
) -> Vec<CompositionStep> {
    let mut steps: Vec<CompositionStep> = Vec::new();

    if !current.services.is_empty() {
        for svc in &current.services {
            let step = match svc.status {
                Some(ServiceStatus::Stopping) => CompositionStep::Noop,
                Some(ServiceStatus::Dead) | Some(ServiceStatus::Stopped) => {
                    CompositionStep::Remove {
                        current: svc.clone(),
                    }
                }
                _ => CompositionStep::Kill {
                    current: svc.clone(),
                    remove_image: false,
                },
            };
            if !steps.contains(&step) {
                steps.push(step);
            }
        }
        debug!(app_id = current.app_id, steps = steps.len(), "removing containers");
        return steps;
    }

    if !context.local_mode {
        steps.extend(current.volumes.values().map(|v| CompositionStep::RemoveVolume {
            current: v.clone(),
        }));
    }
    steps.extend(current.networks.values().map(|n| CompositionStep::RemoveNetwork {
        current: n.clone(),
    }));
    debug!(app_id = current.app_id, steps = steps.len(), "removing app resources");
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::network::Network;
    use crate::types::service::fixtures::{observed, running, service};
    use crate::types::step::StepAction;
    use crate::types::volume::{Volume, VolumeConfig};

    fn app_with_volume() -> Application {
        Application::current(1)
            .with_network(Network::default_for(1))
            .with_volume(Volume::new(1, "data", VolumeConfig::default()))
    }

    fn actions(steps: &[CompositionStep]) -> Vec<StepAction> {
        steps.iter().map(CompositionStep::action).collect()
    }

    #[test]
    fn kills_before_removing_volume() {
        let mut svc = running("main", "image1");
        svc.config.volumes.push("data:/data".into());
        let current = app_with_volume().with_service(svc);
        let ctx = ReconcileContext::new();

        assert_eq!(actions(&compute_removal_steps(&current, &ctx)), vec![StepAction::Kill]);

        let emptied = app_with_volume();
        assert_eq!(
            actions(&compute_removal_steps(&emptied, &ctx)),
            vec![StepAction::RemoveVolume, StepAction::RemoveNetwork]
        );
    }

    #[test]
    fn container_steps_follow_status() {
        let current = Application::current(1)
            .with_service(observed(service("a", "a"), ServiceStatus::Stopping))
            .with_service(observed(service("b", "b"), ServiceStatus::Dead))
            .with_service(observed(service("c", "c"), ServiceStatus::Stopped))
            .with_service(observed(service("d", "d"), ServiceStatus::Installing));
        let steps = compute_removal_steps(&current, &ReconcileContext::new());
        assert_eq!(
            actions(&steps),
            vec![
                StepAction::Noop,
                StepAction::Remove,
                StepAction::Remove,
                StepAction::Kill
            ]
        );
    }

    #[test]
    fn local_mode_keeps_volumes() {
        let ctx = ReconcileContext {
            local_mode: true,
            ..ReconcileContext::new()
        };
        let steps = compute_removal_steps(&app_with_volume(), &ctx);
        assert_eq!(actions(&steps), vec![StepAction::RemoveNetwork]);
    }

    #[test]
    fn empty_app_needs_nothing() {
        assert!(compute_removal_steps(&Application::current(1), &ReconcileContext::new()).is_empty());
    }
}
