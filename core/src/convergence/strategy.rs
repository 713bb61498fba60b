//! Update strategies: how a running service is replaced by a new config.
//!
//! Every strategy has the same two-phase shape: a teardown phase that gets
//! the old container out of the way and a bring-up phase that fetches and
//! starts the new one. The strategy decides which phase is eligible while
//! the old container is still present; once it is gone the planner treats
//! the target as a fresh install.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::types::service::Service;

/// Service label selecting the update strategy.
pub const UPDATE_STRATEGY_LABEL: &str = "io.convoy.update.strategy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStrategy {
    /// Fetch the new image while the old container runs, kill once every
    /// image of the release is available.
    #[default]
    DownloadThenKill,
    /// Kill first, fetch once the old container is gone.
    KillThenDownload,
    /// Like kill-then-download, also deleting the old image to free space.
    DeleteThenDownload,
    /// Start the new container next to the old one; the old one is killed
    /// once the new one runs.
    HandOver,
}

/// What the planner knows about one replacement at this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// The new image still has to be fetched.
    pub needs_download: bool,
    /// Every image of the target release is on the device.
    pub ready_for_kill: bool,
    /// The new container's dependencies are satisfied.
    pub ready_for_start: bool,
}

/// The phase currently eligible for stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Fetch,
    Kill { remove_image: bool },
    /// Start the new container while the old one is still present.
    BringUp,
    Wait,
}

impl UpdateStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DownloadThenKill => "download-then-kill",
            Self::KillThenDownload => "kill-then-download",
            Self::DeleteThenDownload => "delete-then-download",
            Self::HandOver => "hand-over",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "download-then-kill" => Some(Self::DownloadThenKill),
            "kill-then-download" => Some(Self::KillThenDownload),
            "delete-then-download" => Some(Self::DeleteThenDownload),
            "hand-over" => Some(Self::HandOver),
            _ => None,
        }
    }

    /// Strategy selected by a label set, falling back on missing or
    /// unrecognized values.
    pub fn from_labels(labels: &BTreeMap<String, String>, fallback: UpdateStrategy) -> Self {
        match labels.get(UPDATE_STRATEGY_LABEL) {
            None => fallback,
            Some(value) => Self::parse(value).unwrap_or_else(|| {
                warn!(value = %value, fallback = fallback.as_str(), "unknown update strategy");
                fallback
            }),
        }
    }

    pub fn for_service(svc: &Service, fallback: UpdateStrategy) -> Self {
        Self::from_labels(&svc.config.labels, fallback)
    }

    /// Phase eligible while the old container still exists.
    pub fn eligible_phase(&self, readiness: Readiness) -> UpdatePhase {
        match self {
            Self::DownloadThenKill => {
                if readiness.needs_download {
                    UpdatePhase::Fetch
                } else if readiness.ready_for_kill {
                    UpdatePhase::Kill {
                        remove_image: false,
                    }
                } else {
                    UpdatePhase::Wait
                }
            }
            Self::KillThenDownload => UpdatePhase::Kill {
                remove_image: false,
            },
            Self::DeleteThenDownload => UpdatePhase::Kill { remove_image: true },
            Self::HandOver => {
                if readiness.needs_download {
                    UpdatePhase::Fetch
                } else if readiness.ready_for_start {
                    UpdatePhase::BringUp
                } else {
                    UpdatePhase::Wait
                }
            }
        }
    }
}

impl std::fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the eligible phase for replacing `current` with `target`. The
/// target's labels pick the strategy, since they describe the release being
/// installed.
pub fn resolve_phase(
    current: &Service,
    target: &Service,
    readiness: Readiness,
    fallback: UpdateStrategy,
) -> UpdatePhase {
    let strategy = UpdateStrategy::for_service(target, fallback);
    let phase = strategy.eligible_phase(readiness);
    trace!(
        service = %current.service_name,
        from_release = current.release_id,
        to_release = target.release_id,
        strategy = strategy.as_str(),
        ?phase,
        "resolved update phase"
    );
    phase
}
