use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CollectionType, Config, ExclusionPolicy};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub service: Option<ServiceConfig>,
    pub selection: Option<SelectionConfig>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: Option<String>,
    /// 0 or absent: no per-request timeout.
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub default_type: Option<CollectionType>,
    pub exclusion_policy: Option<ExclusionPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub color: Option<bool>,
}

impl ConfigFile {
    /// Snapshot of an effective [`Config`], e.g. for `--save`.
    pub fn from_config(config: &Config, color: Option<bool>) -> Self {
        Self {
            service: Some(ServiceConfig {
                base_url: Some(config.base_url.clone()),
                timeout_secs: config.timeout_secs,
                connect_timeout_secs: Some(config.connect_timeout_secs),
            }),
            selection: Some(SelectionConfig {
                default_type: Some(config.default_type),
                exclusion_policy: Some(config.exclusion_policy),
            }),
            display: color.map(|c| DisplayConfig { color: Some(c) }),
        }
    }
}

/// Platform config directory path: `<config_dir>/writecheck/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("writecheck").join("config.toml"))
}

/// Load config by cascading CWD `.writecheck.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".writecheck.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        service: Some(ServiceConfig {
            base_url: overlay
                .service
                .as_ref()
                .and_then(|s| s.base_url.clone())
                .or_else(|| base.service.as_ref().and_then(|s| s.base_url.clone())),
            timeout_secs: overlay
                .service
                .as_ref()
                .and_then(|s| s.timeout_secs)
                .or_else(|| base.service.as_ref().and_then(|s| s.timeout_secs)),
            connect_timeout_secs: overlay
                .service
                .as_ref()
                .and_then(|s| s.connect_timeout_secs)
                .or_else(|| {
                    base.service
                        .as_ref()
                        .and_then(|s| s.connect_timeout_secs)
                }),
        }),
        selection: Some(SelectionConfig {
            default_type: overlay
                .selection
                .as_ref()
                .and_then(|s| s.default_type)
                .or_else(|| base.selection.as_ref().and_then(|s| s.default_type)),
            exclusion_policy: overlay
                .selection
                .as_ref()
                .and_then(|s| s.exclusion_policy)
                .or_else(|| base.selection.as_ref().and_then(|s| s.exclusion_policy)),
        }),
        display: Some(DisplayConfig {
            color: overlay
                .display
                .as_ref()
                .and_then(|d| d.color)
                .or_else(|| base.display.as_ref().and_then(|d| d.color)),
        }),
    }
}

/// Save the config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    save_to_path(config, &path)?;
    Ok(path)
}

pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
    Ok(())
}
