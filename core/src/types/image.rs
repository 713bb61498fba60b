use serde::{Deserialize, Serialize};

use super::service::Service;

/// A pull target for one service of one release. Distinct from the service
/// itself: a service moves through several image references over releases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRef {
    pub app_id: u32,
    pub service_id: u32,
    pub image_id: u32,
    pub release_id: u32,
    pub name: String,
    pub service_name: String,
    #[serde(default)]
    pub dependent: bool,
}

impl ImageRef {
    pub fn for_service(svc: &Service) -> Self {
        ImageRef {
            app_id: svc.app_id,
            service_id: svc.service_id,
            image_id: svc.image_id,
            release_id: svc.release_id,
            name: svc.config.image.clone(),
            service_name: svc.service_name.clone(),
            dependent: false,
        }
    }

    /// Whether this image satisfies the service's image reference.
    pub fn provides(&self, svc: &Service) -> bool {
        self.name == svc.config.image
    }
}
