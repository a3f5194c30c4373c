pub mod config;
pub mod run;

use std::path::{Path, PathBuf};

use intake_core::IntakeConfig;

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invoice-intake")
        .join("config.json")
}

/// Load the configuration and report which file it came from.
///
/// An explicit path must exist. Without one the default location is used
/// when present, otherwise built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<(IntakeConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        return Ok((IntakeConfig::from_file(path)?, Some(path.to_path_buf())));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        let config = IntakeConfig::from_file(&default_path)?;
        Ok((config, Some(default_path)))
    } else {
        Ok((IntakeConfig::default(), None))
    }
}
