use super::{ConfigError, Settings};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "procflow.yaml";

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let settings = Settings::from_path(path)?;
    settings.validate()?;
    Ok(settings)
}
