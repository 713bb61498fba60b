//! Compose-style release manifests and their conversion into a target
//! `Application`.
//!
//! A manifest is the declarative form a release arrives in. It is parsed
//! with serde, checked by `validate`, and only then turned into entities, so
//! the planner never sees a dangling reference.

pub mod validate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::Application;
use crate::error::ConfigurationError;
use crate::types::network::{Network, NetworkConfig};
use crate::types::service::{RestartPolicy, Service, ServiceConfig};
use crate::types::volume::{Volume, VolumeConfig};
use crate::types::DEFAULT_NETWORK;


/// One release of one app, as declared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppManifest {
    pub app_id: u32,
    pub release_id: u32,

    /// Services keyed by service name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceManifest>,

    /// Declared networks. A bare `name:` entry takes every default.
    #[serde(default)]
    pub networks: BTreeMap<String, Option<ResourceManifest>>,

    #[serde(default)]
    pub volumes: BTreeMap<String, Option<ResourceManifest>>,
}


/// A service entry in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceManifest {
    #[serde(default)]
    pub service_id: u32,

    #[serde(default)]
    pub image_id: u32,

    #[serde(default)]
    pub image: String,

    #[serde(default = "default_running")]
    pub running: bool,

    #[serde(default)]
    pub privileged: bool,

    /// Restart policy name. Parsed during validation so an unknown value
    /// reports the service it belongs to.
    #[serde(default)]
    pub restart: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Mount strings, `source:dest[:mode]`.
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Attached networks. Empty means `default`.
    #[serde(default)]
    pub networks: Vec<String>,

    #[serde(default)]
    pub depends_on: Vec<String>,
}


/// Driver settings of a declared network or volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceManifest {
    #[serde(default)]
    pub driver: Option<String>,

    #[serde(default)]
    pub driver_opts: BTreeMap<String, String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}


fn default_running() -> bool {
    true
}


impl AppManifest {
    /// An empty manifest for a release.
    pub fn new(app_id: u32, release_id: u32) -> Self {
        AppManifest {
            app_id,
            release_id,
            services: BTreeMap::new(),
            networks: BTreeMap::new(),
            volumes: BTreeMap::new(),
        }
    }

    /// Validate the manifest and build the target application.
    pub fn build(&self) -> Result<Application, ConfigurationError> {
        validate::check_manifest(self)?;

        let mut app = Application::target(self.app_id, self.release_id);
        for (name, decl) in &self.networks {
            app = app.with_network(self.network(name, decl.as_ref()));
        }
        for (name, decl) in &self.volumes {
            app = app.with_volume(self.volume(name, decl.as_ref()));
        }
        for (name, decl) in &self.services {
            app = app.with_service(self.service(name, decl)?);
        }
        app.check_unique_services()?;

        debug!(
            app_id = app.app_id,
            release_id = self.release_id,
            services = app.services.len(),
            networks = app.networks.len(),
            volumes = app.volumes.len(),
            "built target application"
        );
        Ok(app)
    }

    fn network(&self, name: &str, decl: Option<&ResourceManifest>) -> Network {
        let mut config = NetworkConfig::default();
        if let Some(decl) = decl {
            if let Some(driver) = &decl.driver {
                config.driver = driver.clone();
            }
            config.driver_opts = decl.driver_opts.clone();
            config.labels = decl.labels.clone();
        }
        Network::new(self.app_id, name, config)
    }

    fn volume(&self, name: &str, decl: Option<&ResourceManifest>) -> Volume {
        let mut config = VolumeConfig::default();
        if let Some(decl) = decl {
            if let Some(driver) = &decl.driver {
                config.driver = driver.clone();
            }
            config.driver_opts = decl.driver_opts.clone();
            config.labels = decl.labels.clone();
        }
        Volume::new(self.app_id, name, config)
    }

    fn service(&self, name: &str, decl: &ServiceManifest) -> Result<Service, ConfigurationError> {
        let restart = match &decl.restart {
            None => RestartPolicy::default(),
            Some(policy) => RestartPolicy::parse(policy).ok_or_else(|| {
                ConfigurationError::InvalidRestartPolicy {
                    service: name.to_string(),
                    policy: policy.clone(),
                }
            })?,
        };
        let networks = if decl.networks.is_empty() {
            vec![DEFAULT_NETWORK.to_string()]
        } else {
            decl.networks.clone()
        };

        Ok(Service {
            app_id: self.app_id,
            service_id: decl.service_id,
            service_name: name.to_string(),
            release_id: self.release_id,
            image_id: decl.image_id,
            config: ServiceConfig {
                image: decl.image.clone(),
                running: decl.running,
                privileged: decl.privileged,
                restart,
                labels: decl.labels.clone(),
                volumes: decl.volumes.clone(),
                networks,
                depends_on: decl.depends_on.clone(),
            },
            status: None,
            container_id: None,
        })
    }
}


impl TryFrom<&AppManifest> for Application {
    type Error = ConfigurationError;

    fn try_from(manifest: &AppManifest) -> Result<Self, Self::Error> {
        manifest.build()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SUPERVISED_LABEL;

    const RELEASE: &str = r#"
app_id: 1
release_id: 3
services:
  db:
    service_id: 10
    image_id: 100
    image: registry/db:2
    restart: unless-stopped
    volumes:
      - data:/var/lib/db
  web:
    service_id: 11
    image_id: 101
    image: registry/web:5
    depends_on: [db]
    networks: [frontend]
    labels:
      io.convoy.update.strategy: hand-over
networks:
  frontend:
    driver: overlay
volumes:
  data:
"#;

    fn release() -> AppManifest {
        serde_yaml::from_str(RELEASE).unwrap()
    }

    #[test]
    fn parse_and_build_release() {
        let app = release().build().unwrap();
        assert!(app.is_target);
        assert_eq!(app.release_id, Some(3));
        assert_eq!(app.services.len(), 2);

        let db = app.service("db").unwrap();
        assert_eq!(db.service_id, 10);
        assert_eq!(db.image_id, 100);
        assert_eq!(db.release_id, 3);
        assert_eq!(db.config.restart, RestartPolicy::UnlessStopped);
        assert!(db.uses_volume("data"));

        let web = app.service("web").unwrap();
        assert_eq!(web.config.depends_on, vec!["db".to_string()]);
        assert_eq!(web.label("io.convoy.update.strategy"), Some("hand-over"));
    }

    #[test]
    fn default_network_is_present_and_attached() {
        let app = release().build().unwrap();
        assert!(app.has_network("default"));
        assert_eq!(app.service("db").unwrap().config.networks, vec!["default".to_string()]);
        assert_eq!(app.service("web").unwrap().config.networks, vec!["frontend".to_string()]);
    }

    #[test]
    fn resources_take_declared_drivers_and_supervised_label() {
        let app = release().build().unwrap();
        let frontend = &app.networks["frontend"];
        assert_eq!(frontend.config.driver, "overlay");
        assert_eq!(frontend.config.labels.get(SUPERVISED_LABEL).map(String::as_str), Some("true"));
        assert_eq!(app.volumes["data"].config.driver, "local");
    }

    #[test]
    fn json_manifest_parses() {
        let json = r#"{"app_id": 2, "release_id": 1, "services": {"main": {"image_id": 5, "image": "main:1"}}}"#;
        let manifest: AppManifest = serde_json::from_str(json).unwrap();
        let app = Application::try_from(&manifest).unwrap();
        let main = app.service("main").unwrap();
        assert!(main.is_running());
        assert_eq!(main.config.restart, RestartPolicy::Always);
    }

    #[test]
    fn invalid_manifest_is_rejected() {
        let mut manifest = release();
        manifest.services.get_mut("web").unwrap().depends_on.push("cache".into());
        assert_eq!(
            manifest.build().unwrap_err(),
            ConfigurationError::UnknownDependency {
                service: "web".into(),
                dependency: "cache".into(),
            }
        );
    }

    #[test]
    fn empty_manifest_builds_default_network_only() {
        let app = AppManifest::new(1, 1).build().unwrap();
        assert!(app.services.is_empty());
        assert_eq!(app.networks.keys().collect::<Vec<_>>(), vec!["default"]);
    }
}
