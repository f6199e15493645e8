use std::path::{Path, PathBuf};

use crate::config::types::StellarConfig;
use crate::error::{Result, StellarError};

/// Get the default configuration file path
pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "stellar", "stellar") {
        proj_dirs.config_dir().join("config.toml")
    } else {
        // Fallback to home directory
        dirs_fallback().join(".stellar").join("config.toml")
    }
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(config_path: Option<&Path>) -> Result<StellarConfig> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    if !path.exists() {
        // Return defaults if no config file exists
        return Ok(StellarConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: StellarConfig =
        toml::from_str(&content).map_err(|e| StellarError::TomlParse(e.to_string()))?;

    Ok(config)
}

/// Get the data directory (uploads live under it)
pub fn get_data_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "stellar", "stellar") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs_fallback().join(".local").join("share").join("stellar")
    }
}

/// Directory uploaded files are resolved from.
pub fn get_upload_dir(config: &StellarConfig) -> PathBuf {
    config
        .sandbox
        .upload_dir
        .clone()
        .unwrap_or_else(|| get_data_dir().join("uploads"))
}

/// Directory per-run workspaces are created under.
pub fn get_scratch_dir(config: &StellarConfig) -> PathBuf {
    config
        .sandbox
        .scratch_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir)
}
