//! Dependency resolution against the *current* state.
//!
//! A target service may only start once everything it needs exists on the
//! device; being declared in the target is not enough.

use crate::app::Application;
use crate::types::service::{Service, ServiceStatus};
use crate::types::Component;

use super::context::ReconcileContext;

/// Every network and named volume the service declares exists in `current`
/// with the configuration `target` wants. A resource that is about to be
/// recreated does not count until the create step has run.
pub fn resources_ready(service: &Service, current: &Application, target: &Application) -> bool {
    service.config.networks.iter().all(|n| {
        current_matches(current.networks.get(n.as_str()), target.networks.get(n.as_str()))
    }) && service.named_volumes().all(|v| {
        current_matches(current.volumes.get(v), target.volumes.get(v))
    })
}

fn current_matches<R: Component>(current: Option<&R>, target: Option<&R>) -> bool {
    match (current, target) {
        (Some(current), Some(target)) => current.is_equal_config(target),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Every `depends_on` service is observed running with a known container.
pub fn dependencies_running(
    service: &Service,
    current: &Application,
    context: &ReconcileContext,
) -> bool {
    service.config.depends_on.iter().all(|dep| {
        context.container_id(dep).is_some()
            && current
                .services_named(dep)
                .any(|s| s.has_status(ServiceStatus::Running))
    })
}

pub fn dependencies_met_for_start(
    service: &Service,
    current: &Application,
    target: &Application,
    context: &ReconcileContext,
) -> bool {
    resources_ready(service, current, target) && dependencies_running(service, current, context)
}

/// Old containers are only killed once the whole target release is on the
/// device, so downtime does not include download time.
pub fn dependencies_met_for_kill(target: &Application, context: &ReconcileContext) -> bool {
    context.local_mode
        || target
            .services
            .iter()
            .all(|svc| context.is_image_available(svc))
}

/// Current services that declare the network.
pub fn network_dependents<'a>(
    current: &'a Application,
    network: &'a str,
) -> impl Iterator<Item = &'a Service> + 'a {
    current.services.iter().filter(move |s| s.uses_network(network))
}

/// Current services that mount the volume.
pub fn volume_dependents<'a>(
    current: &'a Application,
    volume: &'a str,
) -> impl Iterator<Item = &'a Service> + 'a {
    current.services.iter().filter(move |s| s.uses_volume(volume))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::image::ImageRef;
    use crate::types::network::{Network, NetworkConfig};
    use crate::types::service::fixtures::{observed, running, service};
    use crate::types::volume::{Volume, VolumeConfig};

    fn with_default() -> Application {
        Application::current(1).with_network(Network::default_for(1))
    }

    #[test]
    fn network_must_exist_in_current() {
        let mut svc = service("main", "a");
        svc.config.networks.push("backend".into());
        assert!(!resources_ready(&svc, &with_default(), &with_default()));
        let current =
            with_default().with_network(Network::new(1, "backend", NetworkConfig::default()));
        assert!(resources_ready(&svc, &current, &current));
    }

    #[test]
    fn named_volume_must_exist_but_binds_do_not() {
        let mut svc = service("main", "a");
        svc.config.volumes = vec!["data:/data".into(), "/dev:/dev".into()];
        assert!(!resources_ready(&svc, &with_default(), &with_default()));
        let current = with_default().with_volume(Volume::new(1, "data", VolumeConfig::default()));
        assert!(resources_ready(&svc, &current, &current));
    }

    #[test]
    fn resource_being_recreated_is_not_ready() {
        let mut svc = service("main", "a");
        svc.config.networks.push("backend".into());
        let current =
            with_default().with_network(Network::new(1, "backend", NetworkConfig::default()));
        let macvlan = NetworkConfig {
            driver: "macvlan".into(),
            ..NetworkConfig::default()
        };
        let target = with_default().with_network(Network::new(1, "backend", macvlan));
        assert!(!resources_ready(&svc, &current, &target));
        assert!(resources_ready(&svc, &target, &target));

        let mut mounted = service("db", "d");
        mounted.config.volumes.push("data:/data".into());
        let old = with_default().with_volume(Volume::new(1, "data", VolumeConfig::default()));
        let nfs = VolumeConfig {
            driver: "nfs".into(),
            ..VolumeConfig::default()
        };
        let new = with_default().with_volume(Volume::new(1, "data", nfs));
        assert!(!resources_ready(&mounted, &old, &new));
    }

    #[test]
    fn dependency_must_be_running_with_container_id() {
        let mut web = service("web", "w");
        web.config.depends_on.push("db".into());
        let mut ctx = ReconcileContext::new();

        let installing = with_default().with_service(observed(service("db", "d"), ServiceStatus::Installing));
        ctx.container_ids.insert("db".into(), "db-container".into());
        assert!(!dependencies_running(&web, &installing, &ctx));

        let up = with_default().with_service(running("db", "d"));
        assert!(dependencies_running(&web, &up, &ctx));
        assert!(dependencies_met_for_start(&web, &up, &up, &ctx));

        ctx.container_ids.clear();
        assert!(!dependencies_running(&web, &up, &ctx));
    }

    #[test]
    fn kill_waits_for_every_target_image() {
        let a = service("a", "image-a");
        let b = service("b", "image-b");
        let target = Application::target(1, 1).with_service(a.clone()).with_service(b);
        let partial = ReconcileContext::new().with_images([ImageRef::for_service(&a)]);
        assert!(!dependencies_met_for_kill(&target, &partial));

        let local = ReconcileContext {
            local_mode: true,
            ..ReconcileContext::new()
        };
        assert!(dependencies_met_for_kill(&target, &local));
    }

    #[test]
    fn dependents_are_found() {
        let mut svc = running("main", "a");
        svc.config.volumes.push("data:/data".into());
        let current = with_default().with_service(svc);
        assert_eq!(network_dependents(&current, "default").count(), 1);
        assert_eq!(volume_dependents(&current, "data").count(), 1);
        assert_eq!(volume_dependents(&current, "other").count(), 0);
    }
}
