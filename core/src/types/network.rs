use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{supervised_labels, Component, DEFAULT_NETWORK};

fn default_driver() -> String {
    "bridge".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default)]
    pub driver_opts: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            driver: default_driver(),
            driver_opts: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub app_id: u32,
    pub config: NetworkConfig,
}

impl Network {
    /// Build a supervisor-managed network; the supervised label is merged
    /// into the given labels.
    pub fn new(app_id: u32, name: impl Into<String>, config: NetworkConfig) -> Self {
        let config = NetworkConfig {
            labels: supervised_labels(config.labels),
            ..config
        };
        Network {
            name: name.into(),
            app_id,
            config,
        }
    }

    /// The `default` network every app is given.
    pub fn default_for(app_id: u32) -> Self {
        Network::new(app_id, DEFAULT_NETWORK, NetworkConfig::default())
    }
}

impl Component for Network {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_equal_config(&self, other: &Self) -> bool {
        self.config == other.config
    }
}
