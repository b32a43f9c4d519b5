//! Per-page settings shared by every engine binding.

use polyview_config::PolyviewConfig;

use crate::security::SslPinning;

/// Settings for a single page.
#[derive(Debug, Clone)]
pub struct WebSettings {
    /// Custom user agent string.
    pub user_agent: Option<String>,
    /// Whether the page background should be transparent.
    pub transparent: bool,
    /// Whether to enable dev tools.
    pub devtools: bool,
    /// Initial, minimum and maximum viewport scale.
    pub zoom_level: f64,
    /// Whether the user may pinch-zoom.
    pub support_zoom: bool,
    /// Whether a back press navigates page history.
    pub capture_back_presses: bool,
    /// Hosts allowed past a certificate host mismatch.
    pub ssl_pinning_hosts: Vec<String>,
    /// Embedded Chromium: load popup targets in place.
    pub disable_popup_windows: bool,
    /// Embedded Chromium: render into an off-screen buffer.
    pub off_screen_rendering: bool,
    /// Forward page console messages to the log.
    pub log_console_messages: bool,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            transparent: false,
            devtools: cfg!(debug_assertions),
            zoom_level: 1.0,
            support_zoom: true,
            capture_back_presses: true,
            ssl_pinning_hosts: Vec::new(),
            disable_popup_windows: true,
            off_screen_rendering: false,
            log_console_messages: true,
        }
    }
}

impl WebSettings {
    /// Build page settings from the loaded configuration.
    pub fn from_config(config: &PolyviewConfig) -> Self {
        Self {
            user_agent: config.webview.user_agent.clone(),
            transparent: config.webview.transparent || config.desktop.transparent,
            devtools: config.webview.devtools,
            zoom_level: config.webview.zoom_level,
            support_zoom: config.webview.support_zoom,
            capture_back_presses: config.webview.capture_back_presses,
            ssl_pinning_hosts: config.security.ssl_pinning_hosts.clone(),
            disable_popup_windows: config.desktop.disable_popup_windows,
            off_screen_rendering: config.desktop.off_screen_rendering,
            log_console_messages: config.logging.console_messages,
        }
    }

    pub fn ssl_pinning(&self) -> SslPinning {
        SslPinning::new(self.ssl_pinning_hosts.iter().cloned())
    }

    /// Script that appends a viewport `<meta>` reflecting the zoom settings.
    /// Engines run it when a page starts or commits.
    pub fn viewport_script(&self) -> String {
        let scale = self.zoom_level;
        let scalable = if self.support_zoom { "yes" } else { "no" };
        format!(
            "var meta = document.createElement('meta');\
             meta.setAttribute('name', 'viewport');\
             meta.setAttribute('content', 'width=device-width, initial-scale={scale}, \
             maximum-scale={scale}, minimum-scale={scale}, user-scalable={scalable}');\
             var head = document.getElementsByTagName('head')[0];\
             if (head) {{ head.appendChild(meta); }}"
        )
    }
}
