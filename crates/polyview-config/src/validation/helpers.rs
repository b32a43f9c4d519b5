//! Shared format checks used by the section validators.

use std::sync::OnceLock;

use regex::Regex;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("static regex"))
}

fn host_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9_-]{0,62})(\.[A-Za-z0-9]([A-Za-z0-9_-]{0,62}))*$")
            .expect("static regex")
    })
}

/// Whether `name` can be used as `window.<name>` in page script.
pub fn is_js_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Whether `host` is a bare DNS host name (no scheme, port or path).
pub fn is_valid_host(host: &str) -> bool {
    host.len() <= 253 && host_pattern().is_match(host)
}
