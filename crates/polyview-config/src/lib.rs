//! polyview configuration.
//!
//! TOML-based settings for pages, the script bridge, TLS pinning and
//! logging. Every section has defaults, so partial files work.
//!
//! ```rust,no_run
//! use polyview_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{PolyviewConfig, UnhandledMethod, CONFIG_SCHEMA_VERSION};
pub use toml_loader::{load_default, load_from_path};

use polyview_common::ConfigError;
use std::path::Path;

/// Load config from the platform default path and validate it.
pub fn load_config() -> Result<PolyviewConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit path and validate it.
pub fn load_config_from(path: &Path) -> Result<PolyviewConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &PolyviewConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&PolyviewConfig::default());
        assert!(json.contains("\"webview\""));
        assert!(json.contains("\"bridge\""));
        assert!(json.contains("\"security\""));
        assert!(json.contains("\"desktop\""));
        assert!(json.contains("\"logging\""));
        assert!(json.contains("\"kmpJsBridge\""));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = config_to_json(&PolyviewConfig::default());
        let parsed: PolyviewConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.bridge.namespace, "kmpJsBridge");
        assert_eq!(parsed.bridge.unhandled_method, UnhandledMethod::Ignore);
    }

    #[test]
    fn load_config_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bridge]\nnamespace = \"not valid\"\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
