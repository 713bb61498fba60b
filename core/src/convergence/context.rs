//! Execution context handed to the planner on every pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::strategy::UpdateStrategy;
use crate::types::config::Settings;
use crate::types::image::ImageRef;
use crate::types::service::Service;

/// What the execution layer knows that the observed app state does not.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileContext {
    /// Images already present on the device.
    #[serde(default)]
    pub available_images: Vec<ImageRef>,
    /// Image ids with a download in progress.
    #[serde(default)]
    pub downloading: Vec<u32>,
    /// Service name to container id for containers the engine created.
    #[serde(default)]
    pub container_ids: BTreeMap<String, String>,
    /// Images are pushed locally instead of fetched.
    #[serde(default)]
    pub local_mode: bool,
    #[serde(default)]
    pub default_update_strategy: UpdateStrategy,
}

impl ReconcileContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context carrying the settings-driven fields.
    pub fn from_settings(settings: &Settings) -> Self {
        ReconcileContext {
            local_mode: settings.local_mode,
            default_update_strategy: settings.default_update_strategy,
            ..Self::default()
        }
    }

    pub fn with_images(mut self, images: impl IntoIterator<Item = ImageRef>) -> Self {
        self.available_images.extend(images);
        self
    }

    pub fn is_image_available(&self, svc: &Service) -> bool {
        self.available_images.iter().any(|img| img.provides(svc))
    }

    pub fn is_downloading(&self, svc: &Service) -> bool {
        self.downloading.contains(&svc.image_id)
    }

    pub fn container_id(&self, service_name: &str) -> Option<&str> {
        self.container_ids.get(service_name).map(String::as_str)
    }
}
