//! Service entity: one container of an app, as desired or as observed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::mount::VolumeMount;

// ---------------------------------------------------------------------------
// ServiceStatus
// ---------------------------------------------------------------------------

/// Observed lifecycle state reported by the engine. A service with no
/// current instance at all is simply absent from the current app.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    Installing,
    Running,
    Stopping,
    Stopped,
    Dead,
}

impl ServiceStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Installing => "Installing",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Dead => "Dead",
        }
    }

    /// States in which the engine is still working on the container.
    pub const fn is_transitional(&self) -> bool {
        matches!(self, Self::Installing | Self::Stopping)
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RestartPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    No,
    #[default]
    Always,
    OnFailure,
    UnlessStopped,
}

impl RestartPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no" => Some(Self::No),
            "always" => Some(Self::Always),
            "on-failure" => Some(Self::OnFailure),
            "unless-stopped" => Some(Self::UnlessStopped),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Always => "always",
            Self::OnFailure => "on-failure",
            Self::UnlessStopped => "unless-stopped",
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

fn default_running() -> bool {
    true
}

/// Everything about a service that decides whether its container must be
/// replaced. For observed services `running` reflects the container state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    pub image: String,
    #[serde(default = "default_running")]
    pub running: bool,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub restart: RestartPolicy,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Mount strings, `source:dest[:mode]`.
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ServiceConfig {
    pub fn new(image: impl Into<String>) -> Self {
        ServiceConfig {
            image: image.into(),
            running: true,
            privileged: false,
            restart: RestartPolicy::default(),
            labels: BTreeMap::new(),
            volumes: Vec::new(),
            networks: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    /// Compare ignoring the run flag. Mounts, networks and dependencies are
    /// compared as sets since the engine does not preserve their order.
    pub fn is_equal_except_running(&self, other: &ServiceConfig) -> bool {
        self.image == other.image
            && self.privileged == other.privileged
            && self.restart == other.restart
            && self.labels == other.labels
            && as_set(&self.volumes) == as_set(&other.volumes)
            && as_set(&self.networks) == as_set(&other.networks)
            && as_set(&self.depends_on) == as_set(&other.depends_on)
    }
}

fn as_set(items: &[String]) -> BTreeSet<&str> {
    items.iter().map(String::as_str).collect()
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    pub app_id: u32,
    pub service_id: u32,
    pub service_name: String,
    pub release_id: u32,
    pub image_id: u32,
    pub config: ServiceConfig,
    /// Observed status; always `None` on target services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

impl Service {
    /// Config-equality: every config field matches, identity and observed
    /// state are ignored.
    pub fn is_equal_config(&self, other: &Service) -> bool {
        self.config.running == other.config.running
            && self.config.is_equal_except_running(&other.config)
    }

    pub fn is_equal_except_running(&self, other: &Service) -> bool {
        self.config.is_equal_except_running(&other.config)
    }

    /// Identity fields that can be rewritten on a live container.
    pub fn has_same_metadata(&self, other: &Service) -> bool {
        self.release_id == other.release_id
            && self.image_id == other.image_id
            && self.service_id == other.service_id
    }

    pub fn is_running(&self) -> bool {
        self.config.running
    }

    pub fn has_status(&self, status: ServiceStatus) -> bool {
        self.status == Some(status)
    }

    /// Names of app volumes mounted by this service. Bind mounts and
    /// unparseable entries are skipped.
    pub fn named_volumes(&self) -> impl Iterator<Item = &str> + '_ {
        self.config
            .volumes
            .iter()
            .filter_map(|m| VolumeMount::parse(m).ok())
            .filter_map(|m| m.volume_name())
    }

    pub fn uses_volume(&self, name: &str) -> bool {
        self.named_volumes().any(|v| v == name)
    }

    pub fn uses_network(&self, name: &str) -> bool {
        self.config.networks.iter().any(|n| n == name)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.config.labels.get(key).map(String::as_str)
    }
}
