//! Reading a `PolyviewConfig` from disk.

use std::path::Path;

use polyview_common::ConfigError;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};
use crate::schema::PolyviewConfig;
use crate::validation;

/// Parse the TOML file at `path`.
///
/// Absent tables and keys fall back to their defaults. Validation problems
/// are logged but do not reject the config.
pub fn load_from_path(path: &Path) -> Result<PolyviewConfig, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::ParseError(format!(
                "cannot read {}: {e}",
                path.display()
            )));
        }
    };

    let config: PolyviewConfig = toml::from_str(&text)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), "config has invalid values: {e}");
    }

    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Load from [`default_config_path`], seeding a commented template and
/// returning defaults when no file exists yet.
pub fn load_default() -> Result<PolyviewConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            info!(path = %path.display(), "no config file, writing defaults");
            create_default_config(&path)?;
            Ok(PolyviewConfig::default())
        }
        other => other,
    }
}
