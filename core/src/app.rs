//! Application aggregate: one app's services, networks and volumes.
//!
//! The same type describes both sides of a reconciliation: the observed
//! `current` state and the desired `target` state. `is_target` tells them
//! apart; nothing identifies an application across passes.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::convergence::context::ReconcileContext;
use crate::convergence::dedupe::StartDedupe;
use crate::convergence::{planner, teardown};
use crate::error::ConfigurationError;
use crate::types::network::Network;
use crate::types::service::Service;
use crate::types::step::CompositionStep;
use crate::types::volume::Volume;
use crate::types::DEFAULT_NETWORK;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Application {
    pub app_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_id: Option<u32>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub networks: BTreeMap<String, Network>,
    #[serde(default)]
    pub volumes: BTreeMap<String, Volume>,
    #[serde(default)]
    pub is_target: bool,
}

impl Application {
    /// An empty observed app.
    pub fn current(app_id: u32) -> Self {
        Application {
            app_id,
            release_id: None,
            services: Vec::new(),
            networks: BTreeMap::new(),
            volumes: BTreeMap::new(),
            is_target: false,
        }
    }

    /// An empty desired app for a release. It already holds the `default`
    /// network.
    pub fn target(app_id: u32, release_id: u32) -> Self {
        let mut app = Application {
            release_id: Some(release_id),
            is_target: true,
            ..Application::current(app_id)
        };
        app.ensure_default_network();
        app
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.networks.insert(network.name.clone(), network);
        self
    }

    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volumes.insert(volume.name.clone(), volume);
        self
    }

    pub fn ensure_default_network(&mut self) {
        if !self.networks.contains_key(DEFAULT_NETWORK) {
            self.networks
                .insert(DEFAULT_NETWORK.to_string(), Network::default_for(self.app_id));
        }
    }

    /// This app with `default` guaranteed, borrowing when nothing is missing.
    pub fn with_default_network(&self) -> Cow<'_, Application> {
        if self.networks.contains_key(DEFAULT_NETWORK) {
            Cow::Borrowed(self)
        } else {
            let mut app = self.clone();
            app.ensure_default_network();
            Cow::Owned(app)
        }
    }

    /// All instances of a service. The current state may hold two during a
    /// hand-over.
    pub fn services_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Service> + 'a {
        self.services.iter().filter(move |s| s.service_name == name)
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.service_name == name)
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.networks.contains_key(name)
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.volumes.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.networks.is_empty() && self.volumes.is_empty()
    }

    /// Service name and release must identify one instance.
    pub fn check_unique_services(&self) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        for svc in &self.services {
            if !seen.insert((svc.service_name.as_str(), svc.release_id)) {
                return Err(ConfigurationError::DuplicateService {
                    service: svc.service_name.clone(),
                    release_id: svc.release_id,
                });
            }
        }
        Ok(())
    }

    /// Next batch of steps moving this (current) app toward `target`.
    pub fn next_steps(
        &self,
        target: &Application,
        context: &ReconcileContext,
        dedupe: &dyn StartDedupe,
    ) -> Vec<CompositionStep> {
        planner::compute_next_steps(self, target, context, dedupe)
    }

    /// Next batch of steps removing this (current) app entirely.
    pub fn removal_steps(&self, context: &ReconcileContext) -> Vec<CompositionStep> {
        teardown::compute_removal_steps(self, context)
    }
}
