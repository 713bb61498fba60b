//! Manifest validation.
//!
//! Every reference a service makes must resolve inside the same manifest:
//! mounted volumes, attached networks and dependencies. The first problem
//! found is returned.

use std::collections::HashMap;

use crate::error::ConfigurationError;
use crate::types::mount::VolumeMount;
use crate::types::service::RestartPolicy;
use crate::types::DEFAULT_NETWORK;

use super::{AppManifest, ServiceManifest};


/// Check a whole manifest. Services are visited in name order.
pub fn check_manifest(manifest: &AppManifest) -> Result<(), ConfigurationError> {
    for (name, svc) in &manifest.services {
        check_service(manifest, name, svc)?;
    }
    check_dependency_cycles(manifest)
}


fn check_service(
    manifest: &AppManifest,
    name: &str,
    svc: &ServiceManifest,
) -> Result<(), ConfigurationError> {
    if svc.image.trim().is_empty() {
        return Err(ConfigurationError::MissingImage(name.to_string()));
    }
    if svc.image_id == 0 {
        return Err(ConfigurationError::MissingImageId(name.to_string()));
    }

    if let Some(policy) = &svc.restart {
        if RestartPolicy::parse(policy).is_none() {
            return Err(ConfigurationError::InvalidRestartPolicy {
                service: name.to_string(),
                policy: policy.clone(),
            });
        }
    }

    if let Some(key) = svc.labels.keys().find(|k| !is_valid_label_key(k)) {
        return Err(ConfigurationError::InvalidLabel {
            service: name.to_string(),
            key: key.clone(),
        });
    }

    for mount in &svc.volumes {
        let parsed = VolumeMount::parse(mount).map_err(|reason| ConfigurationError::InvalidMount {
            service: name.to_string(),
            mount: mount.clone(),
            reason,
        })?;
        if let Some(volume) = parsed.volume_name() {
            if !manifest.volumes.contains_key(volume) {
                return Err(ConfigurationError::UndeclaredVolume {
                    service: name.to_string(),
                    volume: volume.to_string(),
                });
            }
        }
    }

    for network in &svc.networks {
        if network != DEFAULT_NETWORK && !manifest.networks.contains_key(network) {
            return Err(ConfigurationError::UndeclaredNetwork {
                service: name.to_string(),
                network: network.clone(),
            });
        }
    }

    for dep in &svc.depends_on {
        if dep == name {
            return Err(ConfigurationError::DependencyCycle(name.to_string()));
        }
        if !manifest.services.contains_key(dep) {
            return Err(ConfigurationError::UnknownDependency {
                service: name.to_string(),
                dependency: dep.clone(),
            });
        }
    }

    Ok(())
}


/// Label keys are non-empty and limited to `[A-Za-z0-9._/-]`.
pub fn is_valid_label_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'))
}


#[derive(Clone, Copy)]
enum Mark {
    Visiting,
    Done,
}


/// Depth-first search over `depends_on`. Reaching a service that is still
/// on the stack closes a cycle.
fn check_dependency_cycles(manifest: &AppManifest) -> Result<(), ConfigurationError> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    for name in manifest.services.keys() {
        visit(manifest, name, &mut marks)?;
    }
    Ok(())
}


fn visit<'a>(
    manifest: &'a AppManifest,
    name: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
) -> Result<(), ConfigurationError> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => return Err(ConfigurationError::DependencyCycle(name.to_string())),
        None => {}
    }

    marks.insert(name, Mark::Visiting);
    if let Some(svc) = manifest.services.get(name) {
        for dep in &svc.depends_on {
            visit(manifest, dep, marks)?;
        }
    }
    marks.insert(name, Mark::Done);
    Ok(())
}
