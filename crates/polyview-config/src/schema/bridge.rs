//! Script bridge settings.

use serde::{Deserialize, Serialize};

/// What the bridge does with a script call naming no registered handler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledMethod {
    /// Drop the call; only a debug log records it.
    #[default]
    Ignore,
    /// Log a warning and reject the waiting script promise.
    Report,
}

/// Bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Global object the bridge is installed under (`window.<namespace>`).
    pub namespace: String,
    pub unhandled_method: UnhandledMethod,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: "kmpJsBridge".to_string(),
            unhandled_method: UnhandledMethod::Ignore,
        }
    }
}
