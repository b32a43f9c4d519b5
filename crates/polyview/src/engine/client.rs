//! Callback bookkeeping shared by every engine binding.
//!
//! Native glue translates its engine's callbacks into calls on a
//! [`PageClient`], which owns the state transitions, the event stream and
//! the navigation-decision protocol. The bindings only map native shapes
//! onto these entry points.

use std::sync::{Arc, Mutex, PoisonError};

use polyview_common::ViewId;
use tracing::{debug, info, warn};

use crate::events::{EventQueue, NavigationDecision, WebViewEvent};
use crate::jsbridge::channel::MessageChannel;
use crate::jsbridge::WebViewJsBridge;
use crate::navigator::{AlertCallback, PromptCallback, WebViewNavigator};
use crate::request::{WebRequest, WebRequestInterceptResult};
use crate::security::{SslPinning, TlsDecision};
use crate::settings::WebSettings;
use crate::state::{SharedState, WebViewError};

/// Per-page callback sink handed to engine bindings.
#[derive(Clone)]
pub struct PageClient {
    view_id: ViewId,
    state: SharedState,
    events: EventQueue,
    navigator: WebViewNavigator,
    settings: Arc<WebSettings>,
    pinning: Arc<SslPinning>,
    /// Target of a rewritten request; the next decision for it is not
    /// intercepted again.
    redirect_target: Arc<Mutex<Option<String>>>,
}

impl PageClient {
    pub fn new(
        view_id: ViewId,
        state: SharedState,
        events: EventQueue,
        navigator: WebViewNavigator,
        settings: WebSettings,
    ) -> Self {
        let pinning = settings.ssl_pinning();
        Self {
            view_id,
            state,
            events,
            navigator,
            settings: Arc::new(settings),
            pinning: Arc::new(pinning),
            redirect_target: Arc::new(Mutex::new(None)),
        }
    }

    pub fn view_id(&self) -> &ViewId {
        &self.view_id
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn navigator(&self) -> &WebViewNavigator {
        &self.navigator
    }

    pub fn settings(&self) -> &WebSettings {
        &self.settings
    }

    fn emit_loading_state(&self, url: Option<&str>) {
        let state = self.state.loading_state();
        self.events.push(WebViewEvent::LoadingStateChanged {
            state,
            url: url.map(str::to_string),
        });
    }

    /// A top-level navigation started.
    pub fn on_page_started(&self, url: Option<&str>) {
        debug!(view_id = self.view_id.short(), url = ?url, "page started");
        self.state.lock().begin_navigation(url);
        if let Some(url) = url {
            let mut target = self
                .redirect_target
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if target.as_deref().is_some_and(|t| same_url(t, url)) {
                *target = None;
            }
        }
        self.emit_loading_state(url);
    }

    /// Progress report in `[0.0, 1.0]`. Values outside the range are clamped.
    pub fn on_progress_changed(&self, progress: f32, url: Option<&str>) {
        let changed = self.state.lock().update_progress(progress, url);
        if changed {
            debug!(view_id = self.view_id.short(), progress, "loading progress");
            self.emit_loading_state(url);
        }
    }

    /// The navigation finished. History flags come from the engine's own
    /// back/forward list. Returns whether the page newly reached `Finished`.
    pub fn on_page_finished(&self, url: Option<&str>, can_go_back: bool, can_go_forward: bool) -> bool {
        let changed = self.state.lock().finish(url);
        if changed {
            info!(view_id = self.view_id.short(), url = ?url, "page finished");
            self.emit_loading_state(url);
        } else {
            debug!(view_id = self.view_id.short(), url = ?url, "duplicate finish suppressed");
        }
        self.on_history_updated(can_go_back, can_go_forward);
        changed
    }

    pub fn on_history_updated(&self, can_go_back: bool, can_go_forward: bool) {
        self.navigator.set_history(can_go_back, can_go_forward);
        let changed = self.state.lock().set_history(can_go_back, can_go_forward);
        if changed {
            self.events.push(WebViewEvent::HistoryChanged {
                can_go_back,
                can_go_forward,
            });
        }
    }

    /// The URL committed without a full start callback (same-document
    /// navigation or a server redirect).
    pub fn on_url_committed(&self, url: &str) {
        self.state.lock().set_last_loaded_url(url);
    }

    /// Record an engine error. `fatal` carries a message when the whole
    /// navigation failed.
    pub fn on_received_error(&self, error: WebViewError, fatal: Option<String>) {
        warn!(
            view_id = self.view_id.short(),
            code = error.code,
            description = %error.description,
            fatal = fatal.is_some(),
            "engine reported an error"
        );
        let is_fatal = fatal.is_some();
        self.state.lock().record_error(error.clone(), fatal);
        self.events.push(WebViewEvent::ErrorReceived { error });
        if is_fatal {
            let url = self.state.lock().last_loaded_url().map(str::to_string);
            self.emit_loading_state(url.as_deref());
        }
    }

    pub fn on_received_title(&self, title: Option<String>) {
        debug!(view_id = self.view_id.short(), title = ?title, "title changed");
        self.state.lock().set_title(title.clone());
        if let Some(title) = title {
            self.events.push(WebViewEvent::TitleChanged { title });
        }
    }

    pub fn on_scroll_changed(&self, x: i32, y: i32) {
        self.state.lock().set_scroll_offset((x, y));
    }

    /// A console line from the page.
    pub fn on_console_message(&self, message: &str) {
        if self.settings.log_console_messages {
            info!(view_id = self.view_id.short(), "console: {message}");
        }
        self.events.push(WebViewEvent::ConsoleMessage {
            message: message.to_string(),
        });
    }

    /// Decide whether the engine may proceed with `request`.
    ///
    /// Only main-frame requests reach the interceptor. A `Modify` verdict
    /// cancels this navigation and queues `stop_loading` followed by a load
    /// of the rewritten request; the decision for that load then proceeds
    /// without being intercepted again.
    pub fn decide_navigation(&self, request: WebRequest) -> NavigationDecision {
        let decision = self.decide(&request);
        debug!(
            view_id = self.view_id.short(),
            url = %request.url,
            main_frame = request.is_for_main_frame,
            ?decision,
            "navigation decision"
        );
        self.events.push(WebViewEvent::NavigationRequested {
            url: request.url,
            decision,
        });
        decision
    }

    fn decide(&self, request: &WebRequest) -> NavigationDecision {
        if !request.is_for_main_frame {
            return NavigationDecision::Proceed;
        }
        {
            let mut target = self
                .redirect_target
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if target.as_deref().is_some_and(|t| same_url(t, &request.url)) {
                *target = None;
                return NavigationDecision::Proceed;
            }
        }
        let Some(interceptor) = self.navigator.request_interceptor() else {
            return NavigationDecision::Proceed;
        };
        match interceptor.on_intercept_url_request(request, &self.navigator) {
            WebRequestInterceptResult::Allow => NavigationDecision::Proceed,
            WebRequestInterceptResult::Reject => NavigationDecision::Cancel,
            WebRequestInterceptResult::Modify(rewritten) => {
                info!(
                    view_id = self.view_id.short(),
                    from = %request.url,
                    to = %rewritten.url,
                    "navigation rewritten by interceptor"
                );
                *self
                    .redirect_target
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(rewritten.url.clone());
                self.navigator.stop_loading();
                self.navigator.load_url(rewritten.url, rewritten.headers);
                NavigationDecision::Rewritten
            }
        }
    }

    /// Whether a rewritten request is still waiting for its decision.
    pub fn has_pending_redirect(&self) -> bool {
        self.redirect_target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Certificate error for `url`. Only host mismatches on pinned hosts
    /// proceed.
    pub fn on_certificate_error(&self, url: &str, host_mismatch: bool) -> TlsDecision {
        self.pinning.decide(url, host_mismatch)
    }

    pub fn on_js_alert(&self, message: &str, callback: AlertCallback) {
        self.navigator.on_js_alert(message, callback);
    }

    pub fn on_js_prompt(&self, message: &str, default_text: Option<&str>, callback: PromptCallback) {
        self.navigator.on_js_prompt(message, default_text, callback);
    }

    /// A raw bridge payload arrived over `channel`.
    pub fn on_bridge_payload(&self, bridge: &WebViewJsBridge, channel: &dyn MessageChannel, raw: &str) {
        let message = match channel.decode(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    view_id = self.view_id.short(),
                    transport = channel.transport(),
                    error = %e,
                    "dropping bridge payload"
                );
                return;
            }
        };
        self.events.push(WebViewEvent::BridgeMessage {
            method_name: message.method_name.clone(),
            callback_id: message.callback_id,
        });
        if let Err(e) = bridge.on_message(message) {
            warn!(view_id = self.view_id.short(), error = %e, "bridge call failed");
        }
    }
}

/// URL equality that ignores a trailing slash, as engines normalise
/// `https://host` to `https://host/`.
fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::NavigationCommand;
    use crate::request::RequestInterceptor;
    use crate::state::{LoadingState, WebViewState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client() -> PageClient {
        PageClient::new(
            ViewId::new(),
            SharedState::new(WebViewState::default()),
            EventQueue::new(),
            WebViewNavigator::new(),
            WebSettings::default(),
        )
    }

    #[test]
    fn finished_is_idempotent() {
        let client = client();
        client.on_page_started(Some("https://a.test"));
        client.on_progress_changed(0.5, Some("https://a.test"));
        assert!(client.on_page_finished(Some("https://a.test"), true, false));
        client.events().drain();

        assert!(!client.on_page_finished(Some("https://a.test"), true, false));
        client.on_progress_changed(1.0, Some("https://a.test"));
        assert_eq!(client.state().loading_state(), LoadingState::Finished);
        assert!(client.events().drain().is_empty());
        assert!(client.navigator().can_go_back());
    }

    #[test]
    fn page_start_resets_errors_and_title() {
        let client = client();
        client.on_page_started(Some("https://a.test"));
        client.on_received_error(WebViewError::new(-2, "lookup"), None);
        client.on_received_title(Some("A".into()));
        client.on_page_finished(Some("https://a.test"), false, false);

        client.on_page_started(Some("https://b.test"));
        let state = client.state().lock();
        assert!(state.errors_for_current_request().is_empty());
        assert_eq!(state.page_title(), None);
        assert_eq!(state.loading_state(), &LoadingState::Loading(0.0));
    }

    #[test]
    fn fatal_error_emits_error_loading() {
        let client = client();
        client.on_page_started(Some("https://a.test"));
        client.events().drain();
        client.on_received_error(WebViewError::new(-6, "unreachable"), Some("unreachable".into()));

        let events = client.events().drain();
        assert!(matches!(events[0], WebViewEvent::ErrorReceived { .. }));
        assert_eq!(
            events[1],
            WebViewEvent::LoadingStateChanged {
                state: LoadingState::ErrorLoading("unreachable".into()),
                url: Some("https://a.test".into()),
            }
        );
    }

    #[test]
    fn no_interceptor_allows_everything() {
        let client = client();
        let decision = client.decide_navigation(WebRequest::new("https://anything.test"));
        assert_eq!(decision, NavigationDecision::Proceed);
    }

    #[test]
    fn subframes_skip_the_interceptor() {
        let client = client();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        client
            .navigator()
            .set_request_interceptor(Some(Arc::new(move |_: &WebRequest, _: &WebViewNavigator| {
                counter.fetch_add(1, Ordering::SeqCst);
                WebRequestInterceptResult::Reject
            })));

        let frame = WebRequest::new("https://ads.test").with_main_frame(false);
        assert_eq!(client.decide_navigation(frame), NavigationDecision::Proceed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reject_cancels() {
        let client = client();
        client
            .navigator()
            .set_request_interceptor(Some(Arc::new(|_: &WebRequest, _: &WebViewNavigator| {
                WebRequestInterceptResult::Reject
            })));
        assert_eq!(
            client.decide_navigation(WebRequest::new("https://a.test")),
            NavigationDecision::Cancel
        );
        assert_eq!(client.navigator().pending_len(), 0);
    }

    /// Rewrites every request to carry an auth header, counting calls.
    struct AddAuth(AtomicUsize);

    impl RequestInterceptor for AddAuth {
        fn on_intercept_url_request(
            &self,
            request: &WebRequest,
            _navigator: &WebViewNavigator,
        ) -> WebRequestInterceptResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            WebRequestInterceptResult::Modify(request.clone().with_header("Authorization", "token"))
        }
    }

    #[test]
    fn modify_reloads_exactly_once() {
        let client = client();
        let interceptor = Arc::new(AddAuth(AtomicUsize::new(0)));
        client
            .navigator()
            .set_request_interceptor(Some(interceptor.clone()));

        let decision = client.decide_navigation(WebRequest::new("https://a.test/page"));
        assert_eq!(decision, NavigationDecision::Rewritten);
        assert!(client.has_pending_redirect());

        let navigator = client.navigator();
        assert!(matches!(navigator.pop_command(), Some(NavigationCommand::StopLoading)));
        match navigator.pop_command() {
            Some(NavigationCommand::LoadUrl { url, headers }) => {
                assert_eq!(url, "https://a.test/page");
                assert_eq!(headers.get("Authorization").map(String::as_str), Some("token"));
            }
            other => panic!("expected LoadUrl, got {other:?}"),
        }
        assert!(navigator.pop_command().is_none());

        // The engine asks again for the rewritten load: it proceeds untouched.
        let decision = client.decide_navigation(WebRequest::new("https://a.test/page"));
        assert_eq!(decision, NavigationDecision::Proceed);
        assert_eq!(interceptor.0.load(Ordering::SeqCst), 1);
        assert_eq!(navigator.pending_len(), 0);

        // A later navigation is intercepted again.
        client.decide_navigation(WebRequest::new("https://a.test/other"));
        assert_eq!(interceptor.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn page_start_clears_pending_redirect() {
        let client = client();
        client
            .navigator()
            .set_request_interceptor(Some(Arc::new(AddAuth(AtomicUsize::new(0)))));
        client.decide_navigation(WebRequest::new("https://a.test"));
        assert!(client.has_pending_redirect());

        // Engines that never ask about programmatic loads just start them.
        client.on_page_started(Some("https://a.test/"));
        assert!(!client.has_pending_redirect());
    }

    #[test]
    fn certificate_errors_follow_pinning() {
        let settings = WebSettings {
            ssl_pinning_hosts: vec!["example.com".into()],
            ..Default::default()
        };
        let client = PageClient::new(
            ViewId::new(),
            SharedState::default(),
            EventQueue::new(),
            WebViewNavigator::new(),
            settings,
        );
        assert_eq!(
            client.on_certificate_error("https://api.example.com/", true),
            TlsDecision::Proceed
        );
        assert_eq!(
            client.on_certificate_error("https://other.test/", true),
            TlsDecision::Cancel
        );
    }

    #[test]
    fn history_changes_emit_once() {
        let client = client();
        client.on_history_updated(true, false);
        client.on_history_updated(true, false);
        let events = client.events().drain();
        assert_eq!(
            events,
            vec![WebViewEvent::HistoryChanged {
                can_go_back: true,
                can_go_forward: false
            }]
        );
    }

    #[test]
    fn console_messages_are_events() {
        let client = client();
        client.on_console_message("hello");
        assert_eq!(
            client.events().drain(),
            vec![WebViewEvent::ConsoleMessage {
                message: "hello".into()
            }]
        );
    }

    #[test]
    fn malformed_bridge_payloads_are_dropped() {
        let client = client();
        let bridge = WebViewJsBridge::new(client.navigator().clone());
        bridge.set_attached(true);
        let channel = crate::jsbridge::channel::JsInterfaceChannel::default();

        client.on_bridge_payload(&bridge, &channel, "not an envelope");
        assert!(client.events().drain().is_empty());

        client.on_bridge_payload(&bridge, &channel, r#"{"callbackId":2,"methodName":"none"}"#);
        assert_eq!(
            client.events().drain(),
            vec![WebViewEvent::BridgeMessage {
                method_name: "none".into(),
                callback_id: 2
            }]
        );
        assert_eq!(client.navigator().pending_len(), 0);
    }
}
