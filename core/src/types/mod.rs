//! Value types shared by the planner, the compose layer and the engines.

pub mod config;
pub mod image;
pub mod mount;
pub mod network;
pub mod service;
pub mod step;
pub mod volume;

use std::collections::BTreeMap;

/// Label stamped on every network and volume the supervisor creates.
pub const SUPERVISED_LABEL: &str = "io.convoy.supervised";

/// Name of the network every app gets, declared or not.
pub const DEFAULT_NETWORK: &str = "default";

/// A named app resource (network or volume) that is diffed by config.
pub trait Component {
    fn name(&self) -> &str;

    /// Whether both describe the same engine-side configuration.
    fn is_equal_config(&self, other: &Self) -> bool;
}

/// Labels given in a manifest plus the supervisor marker.
pub(crate) fn supervised_labels(labels: BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut labels = labels;
    labels.insert(SUPERVISED_LABEL.to_string(), "true".to_string());
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supervised_label_is_merged() {
        let mut labels = BTreeMap::new();
        labels.insert("test".to_string(), "test".to_string());
        let merged = supervised_labels(labels);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get(SUPERVISED_LABEL).map(String::as_str), Some("true"));
        assert_eq!(merged.get("test").map(String::as_str), Some("test"));
    }
}
