//! Error types for convoy-core.
//!
//! The step generators never fail. Errors only arise while building entities
//! from a manifest, while loading files, or inside an execution engine.

use std::path::PathBuf;

use crate::types::step::StepAction;

// ---------------------------------------------------------------------------
// ConfigurationError
// ---------------------------------------------------------------------------

/// A manifest could not be turned into valid entities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A volume mount string is not of the form `source:dest[:mode]`.
    #[error("service '{service}': invalid volume mount '{mount}': {reason}")]
    InvalidMount {
        service: String,
        mount: String,
        reason: String,
    },

    /// A named volume mount refers to a volume the app does not declare.
    #[error("service '{service}' references undeclared volume '{volume}'")]
    UndeclaredVolume { service: String, volume: String },

    /// A network attachment refers to a network the app does not declare.
    #[error("service '{service}' references undeclared network '{network}'")]
    UndeclaredNetwork { service: String, network: String },

    /// `depends_on` names a service that is not part of the app.
    #[error("service '{service}' depends on unknown service '{dependency}'")]
    UnknownDependency { service: String, dependency: String },

    /// `depends_on` edges form a cycle.
    #[error("dependency cycle involving service '{0}'")]
    DependencyCycle(String),

    /// A label key is empty or contains characters outside `[A-Za-z0-9._/-]`.
    #[error("service '{service}': invalid label key '{key}'")]
    InvalidLabel { service: String, key: String },

    #[error("service '{service}': unknown restart policy '{policy}'")]
    InvalidRestartPolicy { service: String, policy: String },

    #[error("service '{0}' has no image")]
    MissingImage(String),

    /// Downloads are tracked by image id, so zero is not a usable id.
    #[error("service '{0}' has no image id")]
    MissingImageId(String),

    /// Two services share a name within the same release.
    #[error("duplicate service '{service}' in release {release_id}")]
    DuplicateService { service: String, release_id: u32 },
}

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

/// Failure to read a manifest, state snapshot or context document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

// ---------------------------------------------------------------------------
// SettingsError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write settings {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_yaml::Error),
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// A step could not be applied by an execution engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("{action} failed: {reason}")]
    StepFailed { action: StepAction, reason: String },

    #[error("no container for service '{0}'")]
    UnknownService(String),
}

impl EngineError {
    /// Create a step failure.
    #[must_use]
    pub fn step_failed(action: StepAction, reason: impl Into<String>) -> Self {
        Self::StepFailed {
            action,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_messages_name_the_service() {
        let err = ConfigurationError::UndeclaredVolume {
            service: "main".into(),
            volume: "data".into(),
        };
        assert_eq!(
            err.to_string(),
            "service 'main' references undeclared volume 'data'"
        );
    }

    #[test]
    fn load_error_wraps_configuration_error() {
        let err: LoadError = ConfigurationError::MissingImage("main".into()).into();
        assert_eq!(err.to_string(), "service 'main' has no image");
    }

    #[test]
    fn engine_error_display() {
        let err = EngineError::step_failed(StepAction::Fetch, "registry unreachable");
        assert_eq!(err.to_string(), "fetch failed: registry unreachable");
    }
}
