use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SettingsError;
use crate::types::config::Settings;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "CONVOY_CONFIG";


/// Defaults for every settings field.
pub fn default_settings() -> Settings {
    Settings::default()
}


/// Load `Settings` from a YAML file. Missing keys take their defaults.
pub fn load(path: &Path) -> Result<Settings, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = parse(&content)?;
    debug!(path = %path.display(), "loaded settings");
    Ok(settings)
}


/// Save `Settings` as YAML.
pub fn save(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let content = serialize(settings)?;
    std::fs::write(path, content).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}


/// Parse settings from a YAML string. An empty document yields defaults.
pub fn parse(content: &str) -> Result<Settings, SettingsError> {
    if content.trim().is_empty() {
        return Ok(default_settings());
    }
    Ok(serde_yaml::from_str(content)?)
}


pub fn serialize(settings: &Settings) -> Result<String, SettingsError> {
    Ok(serde_yaml::to_string(settings)?)
}


/// Pick the settings file: an explicit path wins, then `CONVOY_CONFIG`,
/// then `~/.config/convoy/settings.yaml` when it exists.
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    resolve_path_from(
        explicit,
        std::env::var(CONFIG_ENV).ok(),
        std::env::var("HOME").ok(),
    )
}


fn resolve_path_from(
    explicit: Option<&Path>,
    env: Option<String>,
    home: Option<String>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env.filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from(home?)
        .join(".config")
        .join("convoy")
        .join("settings.yaml");
    default.exists().then_some(default)
}


/// Load the resolved settings file, or defaults when there is none.
pub fn load_or_default(explicit: Option<&Path>) -> Result<Settings, SettingsError> {
    match resolve_path(explicit) {
        Some(path) => load(&path),
        None => Ok(default_settings()),
    }
}
