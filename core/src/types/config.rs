use serde::{Deserialize, Serialize};

use crate::convergence::strategy::UpdateStrategy;

/// Supervisor settings. Every field has a default so partial files load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Images are pushed by a developer tool instead of pulled.
    pub local_mode: bool,
    /// Upper bound on reconciliation passes per convergence run.
    pub max_passes: u32,
    /// Strategy used when a service carries no (or an unknown) strategy label.
    pub default_update_strategy: UpdateStrategy,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            local_mode: false,
            max_passes: 32,
            default_update_strategy: UpdateStrategy::DownloadThenKill,
            log_filter: "convoy=info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip() {
        let settings = Settings {
            local_mode: true,
            max_passes: 8,
            default_update_strategy: UpdateStrategy::KillThenDownload,
            log_filter: "convoy=debug".into(),
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn partial_settings_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"max_passes": 4}"#).unwrap();
        assert_eq!(settings.max_passes, 4);
        assert!(!settings.local_mode);
        assert_eq!(settings.default_update_strategy, UpdateStrategy::DownloadThenKill);
    }
}
