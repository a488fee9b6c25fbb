use crate::app::command_support::{load_cli_settings, map_config_err, map_store_err, open_store};
use crate::config::write_default_settings;
use std::path::Path;

pub fn cmd_setup(config_path: &Path) -> Result<String, String> {
    let created_config = if config_path.exists() {
        false
    } else {
        write_default_settings(config_path).map_err(map_config_err)?;
        true
    };
    let settings = load_cli_settings(config_path)?;
    let store = open_store(&settings)?;
    store.bootstrap_catalog().map_err(map_store_err)?;
    store.verify_catalog().map_err(map_store_err)?;

    Ok(format!(
        "setup complete\nconfig={}\nconfig_created={}\ndatabase={}",
        config_path.display(),
        created_config,
        settings.database_path.display()
    ))
}
