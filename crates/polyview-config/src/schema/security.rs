//! Transport security settings.

use serde::{Deserialize, Serialize};

/// TLS policy for page navigation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Hosts (and their direct subdomains) allowed to proceed past a
    /// certificate host mismatch. Everything else is cancelled.
    pub ssl_pinning_hosts: Vec<String>,
}
