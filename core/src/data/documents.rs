//! Loading manifests, state snapshots and context documents from disk.
//!
//! Files ending in `.json` are parsed as JSON; anything else as YAML.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::app::Application;
use crate::compose::AppManifest;
use crate::convergence::context::ReconcileContext;
use crate::error::LoadError;


fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}


/// Read and deserialize any document.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(path, &content)
}


/// Deserialize `content`, picking the format from `path`.
pub fn parse_document<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T, LoadError> {
    if is_json(path) {
        serde_json::from_str(content).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_yaml::from_str(content).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}


/// Load a release manifest and build the validated target application.
pub fn load_target(path: &Path) -> Result<Application, LoadError> {
    let manifest: AppManifest = load_document(path)?;
    let app = manifest.build()?;
    debug!(path = %path.display(), app_id = app.app_id, "loaded target");
    Ok(app)
}


/// Load an observed-state snapshot. The result is always treated as current.
pub fn load_current(path: &Path) -> Result<Application, LoadError> {
    let mut app: Application = load_document(path)?;
    app.is_target = false;
    app.check_unique_services()?;
    debug!(path = %path.display(), services = app.services.len(), "loaded current state");
    Ok(app)
}


pub fn load_context(path: &Path) -> Result<ReconcileContext, LoadError> {
    load_document(path)
}
