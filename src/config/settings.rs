use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

use super::FilterConfig;

const APP_NAME: &str = "WorkshopFilter";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("com", "workshopfilter", APP_NAME)
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
pub fn get_config_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(CONFIG_FILE))
}

fn resolve_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => get_config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory")),
    }
}

/// Loads the configuration from `config_path`, or from the platform location when `None`.
///
/// A missing file is created with defaults. A file that cannot be parsed is replaced in memory
/// by the defaults, with a warning; the file on disk is left alone.
pub fn load_config(config_path: Option<&Path>) -> Result<FilterConfig> {
    let config_path = resolve_path(config_path)?;

    if !config_path.exists() {
        tracing::info!(
            "Config file not found, creating default config at {:?}",
            config_path
        );
        let default_config = FilterConfig::default();
        save_config(&default_config, Some(&config_path))?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path)?;

    match serde_json::from_str::<FilterConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", config_path);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file at {:?}: {}. Falling back to default config.",
                config_path,
                e
            );
            Ok(FilterConfig::default())
        }
    }
}

/// Saves the configuration to `config_path`, or to the platform location when `None`.
pub fn save_config(config: &FilterConfig, config_path: Option<&Path>) -> Result<()> {
    let config_path = resolve_path(config_path)?;

    if let Some(config_dir) = config_path.parent() {
        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            tracing::info!("Created config directory: {:?}", config_dir);
        }
    }

    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_json)?;
    tracing::info!("Saved config to {:?}", config_path);

    Ok(())
}

/// Exports the configuration to a user-specified JSON file.
pub fn export_config(config: &FilterConfig, export_path: &Path) -> Result<()> {
    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(export_path, config_json)?;
    tracing::info!("Exported config to {:?}", export_path);
    Ok(())
}

/// Imports a configuration from a user-specified JSON file. Unlike [`load_config`], a file that
/// does not parse is an error.
pub fn import_config(import_path: &Path) -> Result<FilterConfig> {
    let config_content = fs::read_to_string(import_path)?;
    let config: FilterConfig = serde_json::from_str(&config_content)
        .with_context(|| format!("Invalid config file {}", import_path.display()))?;
    tracing::info!("Imported config from {:?}", import_path);
    Ok(config)
}

// Platform-specific configuration paths for reference:
// macOS:   ~/Library/Application Support/com.workshopfilter.WorkshopFilter/
// Linux:   ~/.config/workshopfilter/
// Windows: %APPDATA%/workshopfilter/WorkshopFilter/config/
