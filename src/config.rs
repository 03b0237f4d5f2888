use blackletter_core::{CoreError, RedactionConfig};
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] CoreError),
}

/// Reads the configuration at `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<RedactionConfig, ConfigError> {
    if !path.exists() {
        log::info!("[Config] {} not found, using defaults", path.display());
        return Ok(RedactionConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    let config: RedactionConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &RedactionConfig) -> Result<(), ConfigError> {
    config.validate()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}
