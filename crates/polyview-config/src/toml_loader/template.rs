//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# polyview configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[webview]
# user_agent = "MyApp/1.0"
# transparent = false
# devtools = false
# zoom_level = 1.0            # (0.0, 5.0]
# support_zoom = true
# capture_back_presses = true

[bridge]
namespace = "kmpJsBridge"     # window.<namespace> in page script
# unhandled_method = "ignore" # "ignore" | "report"

[security]
# Hosts allowed through a certificate host mismatch. Others are cancelled.
# ssl_pinning_hosts = ["example.com"]

[desktop]
# disable_popup_windows = true
# off_screen_rendering = false
# transparent = true

[logging]
# level = "info"              # trace | debug | info | warn | error
# console_messages = true
"##
    .to_string()
}
