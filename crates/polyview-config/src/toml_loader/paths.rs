//! Where the config file lives, and seeding it on first run.

use std::path::{Path, PathBuf};

use polyview_common::ConfigError;
use tracing::info;

use super::template::default_config_toml;

const APP_DIR: &str = "polyview";
const FILE_NAME: &str = "config.toml";

/// `<platform config dir>/polyview/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|base| base.join(APP_DIR).join(FILE_NAME))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory".into()))
}

/// Write the commented default template to `path`, creating parent
/// directories as needed.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_err = |what: &str, target: &Path, e: std::io::Error| {
        ConfigError::ParseError(format!("{what} {}: {e}", target.display()))
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err("cannot create", dir, e))?;
    }
    std::fs::write(path, default_config_toml())
        .map_err(|e| io_err("cannot write default config to", path, e))?;

    info!(path = %path.display(), "wrote default config");
    Ok(())
}
