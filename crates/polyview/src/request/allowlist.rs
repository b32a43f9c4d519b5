use tracing::warn;

use crate::navigator::WebViewNavigator;

use super::{RequestInterceptor, WebRequest, WebRequestInterceptResult};

/// Interceptor that only lets through URLs starting with one of a fixed set
/// of prefixes. Everything else is rejected.
#[derive(Debug, Clone, Default)]
pub struct PrefixAllowList {
    prefixes: Vec<String>,
}

impl PrefixAllowList {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether a URL is allowed by the list.
    pub fn is_allowed(&self, url: &str) -> bool {
        self.prefixes.iter().any(|prefix| url.starts_with(prefix.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl RequestInterceptor for PrefixAllowList {
    fn on_intercept_url_request(
        &self,
        request: &WebRequest,
        _navigator: &WebViewNavigator,
    ) -> WebRequestInterceptResult {
        if self.is_allowed(&request.url) {
            WebRequestInterceptResult::Allow
        } else {
            warn!(url = %request.url, "navigation blocked: URL not in allowlist");
            WebRequestInterceptResult::Reject
        }
    }
}
