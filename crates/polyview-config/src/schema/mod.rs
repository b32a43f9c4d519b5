//! Configuration schema types for polyview.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod bridge;
mod desktop;
mod security;
mod system;
mod webview;

pub use bridge::*;
pub use desktop::*;
pub use security::*;
pub use system::*;
pub use webview::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
///
/// Every option has a default; only override what you want to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolyviewConfig {
    pub webview: WebViewSection,
    pub bridge: BridgeConfig,
    pub security: SecurityConfig,
    pub desktop: DesktopConfig,
    pub logging: LoggingConfig,
}
