//! Full configuration validation.
//!
//! Each section has its own check; all errors are collected into a single
//! `ConfigError`.

mod helpers;


use crate::schema::PolyviewConfig;
use polyview_common::ConfigError;

pub use helpers::{is_js_identifier, is_valid_host};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &PolyviewConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_webview(&mut errors, config);
    validate_bridge(&mut errors, config);
    validate_security(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_webview(errors: &mut Vec<String>, config: &PolyviewConfig) {
    let zoom = config.webview.zoom_level;
    if !(zoom > 0.0 && zoom <= 5.0) {
        errors.push(format!(
            "webview.zoom_level = {zoom} is out of range (0.0, 5.0]"
        ));
    }
    if let Some(ua) = &config.webview.user_agent {
        if ua.trim().is_empty() {
            errors.push("webview.user_agent must not be blank".into());
        }
    }
}

fn validate_bridge(errors: &mut Vec<String>, config: &PolyviewConfig) {
    if !is_js_identifier(&config.bridge.namespace) {
        errors.push(format!(
            "bridge.namespace = {:?} is not a valid script identifier",
            config.bridge.namespace
        ));
    }
}

fn validate_security(errors: &mut Vec<String>, config: &PolyviewConfig) {
    for host in &config.security.ssl_pinning_hosts {
        if !is_valid_host(host) {
            errors.push(format!("security.ssl_pinning_hosts: {host:?} is not a host name"));
        }
    }
}
