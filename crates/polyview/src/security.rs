//! TLS host-mismatch pinning.
//!
//! When an engine reports a certificate whose host does not match the
//! request, the navigation may still proceed if the URL belongs to one of
//! the configured hosts (or a single-label subdomain of one). Every other
//! certificate error is cancelled.

use regex::Regex;
use tracing::{debug, warn};

/// Verdict for a certificate error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsDecision {
    Proceed,
    Cancel,
}

/// Allow-list of hosts whose certificate host mismatches are tolerated.
#[derive(Debug, Clone, Default)]
pub struct SslPinning {
    hosts: Vec<String>,
    pattern: Option<Regex>,
}

impl SslPinning {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hosts: Vec<String> = hosts
            .into_iter()
            .map(Into::into)
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        let pattern = if hosts.is_empty() {
            None
        } else {
            let alternatives = hosts
                .iter()
                .map(|h| regex::escape(h))
                .collect::<Vec<_>>()
                .join("|");
            let source = format!(r"^(?i)(https?://)?([a-zA-Z0-9_-]+\.)?({alternatives})(:\d+)?(/.*)?$");
            match Regex::new(&source) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(error = %e, "invalid SSL pinning pattern; all mismatches will be cancelled");
                    None
                }
            }
        };
        Self { hosts, pattern }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Whether `url` belongs to a pinned host.
    pub fn matches(&self, url: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(url))
    }

    /// Decide a certificate error. Only host mismatches on pinned hosts
    /// proceed.
    pub fn decide(&self, url: &str, host_mismatch: bool) -> TlsDecision {
        if host_mismatch && self.matches(url) {
            debug!(url, "certificate host mismatch accepted for pinned host");
            TlsDecision::Proceed
        } else {
            warn!(url, host_mismatch, "certificate error; cancelling");
            TlsDecision::Cancel
        }
    }
}
