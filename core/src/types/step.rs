//! Composition steps: the planner's only output.
//!
//! Each variant carries exactly the entities its action needs, so a `fetch`
//! without an image or a `kill` without a container cannot be expressed.

use serde::{Deserialize, Serialize};

use super::image::ImageRef;
use super::network::Network;
use super::service::Service;
use super::volume::Volume;

/// One atomic operation toward convergence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CompositionStep {
    CreateNetwork {
        target: Network,
    },
    RemoveNetwork {
        current: Network,
    },
    CreateVolume {
        target: Volume,
    },
    RemoveVolume {
        current: Volume,
    },
    /// Stop and remove the container. `remove_image` also deletes its image.
    Kill {
        current: Service,
        #[serde(default)]
        remove_image: bool,
    },
    /// Remove an already-dead container.
    Remove {
        current: Service,
    },
    Stop {
        current: Service,
    },
    /// Start `target`, reusing `current`'s container when there is one. A
    /// target with `running: false` is created without being started.
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current: Option<Service>,
        target: Service,
    },
    Fetch {
        image: ImageRef,
        service_name: String,
    },
    /// Rewrite identity labels (release, image id) without a restart.
    UpdateMetadata {
        current: Service,
        target: Service,
    },
    /// Nothing to do yet, but not converged: ask again later.
    Noop,
}

/// The action of a step, without its payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum StepAction {
    CreateNetwork,
    RemoveNetwork,
    CreateVolume,
    RemoveVolume,
    Kill,
    Remove,
    Stop,
    Start,
    Fetch,
    UpdateMetadata,
    Noop,
}

impl StepAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateNetwork => "createNetwork",
            Self::RemoveNetwork => "removeNetwork",
            Self::CreateVolume => "createVolume",
            Self::RemoveVolume => "removeVolume",
            Self::Kill => "kill",
            Self::Remove => "remove",
            Self::Stop => "stop",
            Self::Start => "start",
            Self::Fetch => "fetch",
            Self::UpdateMetadata => "updateMetadata",
            Self::Noop => "noop",
        }
    }
}

impl std::fmt::Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CompositionStep {
    pub fn action(&self) -> StepAction {
        match self {
            Self::CreateNetwork { .. } => StepAction::CreateNetwork,
            Self::RemoveNetwork { .. } => StepAction::RemoveNetwork,
            Self::CreateVolume { .. } => StepAction::CreateVolume,
            Self::RemoveVolume { .. } => StepAction::RemoveVolume,
            Self::Kill { .. } => StepAction::Kill,
            Self::Remove { .. } => StepAction::Remove,
            Self::Stop { .. } => StepAction::Stop,
            Self::Start { .. } => StepAction::Start,
            Self::Fetch { .. } => StepAction::Fetch,
            Self::UpdateMetadata { .. } => StepAction::UpdateMetadata,
            Self::Noop => StepAction::Noop,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }

    /// The service this step acts on, if any.
    pub fn service_name(&self) -> Option<&str> {
        match self {
            Self::Kill { current, .. }
            | Self::Remove { current }
            | Self::Stop { current }
            | Self::UpdateMetadata { current, .. } => Some(&current.service_name),
            Self::Start { target, .. } => Some(&target.service_name),
            Self::Fetch { service_name, .. } => Some(service_name),
            _ => None,
        }
    }

    /// The network or volume this step acts on, if any.
    pub fn resource_name(&self) -> Option<&str> {
        match self {
            Self::CreateNetwork { target } => Some(&target.name),
            Self::RemoveNetwork { current } => Some(&current.name),
            Self::CreateVolume { target } => Some(&target.name),
            Self::RemoveVolume { current } => Some(&current.name),
            _ => None,
        }
    }

    /// Short one-line description for logs and text output.
    pub fn describe(&self) -> String {
        match (self.service_name(), self.resource_name()) {
            (Some(svc), _) => format!("{} {}", self.action(), svc),
            (None, Some(res)) => format!("{} {}", self.action(), res),
            (None, None) => self.action().to_string(),
        }
    }
}

/// True if no step in the batch requires work from the engine.
pub fn is_settled(steps: &[CompositionStep]) -> bool {
    steps.iter().all(CompositionStep::is_noop)
}
