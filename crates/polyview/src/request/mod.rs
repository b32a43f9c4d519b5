//! Navigation requests and the interception policy hook.
//!
//! Every engine builds a [`WebRequest`] from its native navigation-decision
//! callback and asks the navigator's [`RequestInterceptor`] what to do with
//! it. The interceptor runs synchronously inside that callback, because
//! all three engines want a same-turn answer.

mod allowlist;

pub use allowlist::PrefixAllowList;

use crate::navigator::WebViewNavigator;
use crate::state::Headers;

/// A navigation the engine is about to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebRequest {
    pub url: String,
    pub headers: Headers,
    pub is_for_main_frame: bool,
    pub is_redirect: bool,
    pub method: String,
}

impl WebRequest {
    /// A main-frame `GET` with no headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Headers::new(),
            is_for_main_frame: true,
            is_redirect: false,
            method: "GET".to_string(),
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_main_frame(mut self, is_for_main_frame: bool) -> Self {
        self.is_for_main_frame = is_for_main_frame;
        self
    }

    pub fn with_redirect(mut self, is_redirect: bool) -> Self {
        self.is_redirect = is_redirect;
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }
}

/// Verdict of a [`RequestInterceptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebRequestInterceptResult {
    /// Let the engine navigate as requested.
    Allow,
    /// Drop the navigation.
    Reject,
    /// Drop the navigation and load this request instead.
    Modify(WebRequest),
}

/// Policy consulted for every main-frame navigation.
///
/// Runs on the engine's callback turn; a slow policy stalls the engine.
pub trait RequestInterceptor: Send + Sync {
    fn on_intercept_url_request(
        &self,
        request: &WebRequest,
        navigator: &WebViewNavigator,
    ) -> WebRequestInterceptResult;
}

impl<F> RequestInterceptor for F
where
    F: Fn(&WebRequest, &WebViewNavigator) -> WebRequestInterceptResult + Send + Sync,
{
    fn on_intercept_url_request(
        &self,
        request: &WebRequest,
        navigator: &WebViewNavigator,
    ) -> WebRequestInterceptResult {
        self(request, navigator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_defaults() {
        let request = WebRequest::new("https://a.test");
        assert_eq!(request.method, "GET");
        assert!(request.is_for_main_frame);
        assert!(!request.is_redirect);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn builder_methods() {
        let request = WebRequest::new("https://a.test/form")
            .with_method("POST")
            .with_header("X-Token", "abc")
            .with_main_frame(false)
            .with_redirect(true);
        assert_eq!(request.method, "POST");
        assert_eq!(request.headers.get("X-Token").map(String::as_str), Some("abc"));
        assert!(!request.is_for_main_frame);
        assert!(request.is_redirect);
    }

    #[test]
    fn closures_are_interceptors() {
        let interceptor = |request: &WebRequest, _: &WebViewNavigator| {
            if request.url.contains("ads") {
                WebRequestInterceptResult::Reject
            } else {
                WebRequestInterceptResult::Allow
            }
        };
        let navigator = WebViewNavigator::new();
        assert_eq!(
            interceptor.on_intercept_url_request(&WebRequest::new("https://ads.test"), &navigator),
            WebRequestInterceptResult::Reject
        );
        assert_eq!(
            interceptor.on_intercept_url_request(&WebRequest::new("https://a.test"), &navigator),
            WebRequestInterceptResult::Allow
        );
    }
}
