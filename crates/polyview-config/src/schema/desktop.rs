//! Settings that only the embedded-Chromium engine honours.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// Load popup targets in place instead of opening a new window.
    pub disable_popup_windows: bool,
    pub off_screen_rendering: bool,
    pub transparent: bool,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            disable_popup_windows: true,
            off_screen_rendering: false,
            transparent: true,
        }
    }
}
