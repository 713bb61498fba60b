use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{supervised_labels, Component};

fn default_driver() -> String {
    "local".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default)]
    pub driver_opts: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        VolumeConfig {
            driver: default_driver(),
            driver_opts: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    pub app_id: u32,
    pub config: VolumeConfig,
}

impl Volume {
    /// Build a supervisor-managed volume; the supervised label is merged
    /// into the given labels.
    pub fn new(app_id: u32, name: impl Into<String>, config: VolumeConfig) -> Self {
        let config = VolumeConfig {
            labels: supervised_labels(config.labels),
            ..config
        };
        Volume {
            name: name.into(),
            app_id,
            config,
        }
    }
}

impl Component for Volume {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_equal_config(&self, other: &Self) -> bool {
        self.config == other.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_labels(pairs: &[(&str, &str)]) -> Volume {
        let labels = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Volume::new(
            1,
            "test-volume",
            VolumeConfig {
                labels,
                ..VolumeConfig::default()
            },
        )
    }

    #[test]
    fn label_change_is_a_config_change() {
        assert!(!with_labels(&[]).is_equal_config(&with_labels(&[("test", "test")])));
        assert!(with_labels(&[("a", "1")]).is_equal_config(&with_labels(&[("a", "1")])));
    }

    #[test]
    fn deserializes_with_local_driver() {
        let config: VolumeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.driver, "local");
    }
}
