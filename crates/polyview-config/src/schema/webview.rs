//! Per-page web settings shared by every engine.

use serde::{Deserialize, Serialize};

/// General page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebViewSection {
    /// Custom user agent string.
    pub user_agent: Option<String>,
    /// Whether the page background should be transparent.
    pub transparent: bool,
    /// Whether to enable dev tools (always on in debug builds).
    pub devtools: bool,
    /// Initial viewport scale (valid range: (0.0, 5.0]).
    pub zoom_level: f64,
    /// Whether the user may pinch-zoom the page.
    pub support_zoom: bool,
    /// Whether the back button navigates page history.
    pub capture_back_presses: bool,
}

impl Default for WebViewSection {
    fn default() -> Self {
        Self {
            user_agent: None,
            transparent: false,
            devtools: cfg!(debug_assertions),
            zoom_level: 1.0,
            support_zoom: true,
            capture_back_presses: true,
        }
    }
}
