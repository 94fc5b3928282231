// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{Config, RawConfig};
use crate::errors::{RelaunchError, Result};

/// Name of the config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "relaunch.toml";

/// Load a configuration file from a given path and return the raw `RawConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        RelaunchError::ConfigError(format!(
            "reading config file at {:?}: {e}\nHave you run 'relaunch init'?",
            path
        ))
    })?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let raw_config = load_from_path(&path)?;
    let config = Config::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the raw configuration for a run.
///
/// - An explicit path must exist.
/// - Without one, `relaunch.toml` is used when present, defaults otherwise.
pub fn resolve_raw(explicit: Option<&Path>) -> Result<RawConfig> {
    match explicit {
        Some(path) => load_from_path(path),
        None => {
            let path = default_config_path();
            if path.exists() {
                load_from_path(&path)
            } else {
                debug!(path = ?path, "no config file found; using defaults");
                Ok(RawConfig::default())
            }
        }
    }
}

/// Serialize a validated configuration back to TOML at `path`.
pub fn save(path: impl AsRef<Path>, config: &Config) -> Result<()> {
    let path = path.as_ref();
    let contents = toml::to_string_pretty(&config.to_raw())?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, contents)?;
    Ok(())
}

/// Helper to resolve a default config path.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
