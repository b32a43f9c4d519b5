//! Binding for the native OS web engine.
//!
//! Native navigation callbacks arrive on a delegate object that exists before
//! the view does, so they are handled by a cloneable [`NativeDelegate`]
//! rather than by the engine itself. Work that needs the view (the viewport
//! script) goes through the navigator queue.

use std::sync::{Arc, Mutex, PoisonError};

use polyview_common::{EngineError, Rect};
use tracing::{debug, warn};

use super::chromium::EvalCallback;
use super::client::PageClient;
use super::{isolate_script, EngineKind, OnceCallback, ScriptCallback, WebEngine, WebViewBundle};
use crate::jsbridge::channel::MessageHandlerChannel;
use crate::jsbridge::WebViewJsBridge;
use crate::navigator::{AlertCallback, PromptCallback};
use crate::request::WebRequest;
use crate::security::TlsDecision;
use crate::state::{Headers, WebViewError};

/// Name of the script message handler the bridge posts to.
pub const SCRIPT_MESSAGE_HANDLER: &str = "iosJsBridge";

/// `NSURLErrorCancelled`: the load was superseded.
pub const URL_ERROR_CANCELLED: i32 = -999;

/// Receives script message bodies.
pub type MessageCallback = Box<dyn Fn(String) + Send + Sync>;

/// The native OS web view.
pub trait WkWebView {
    fn url(&self) -> Option<String>;

    fn load_request(
        &mut self,
        url: &str,
        method: &str,
        headers: &Headers,
        body: Option<&[u8]>,
    ) -> Result<(), EngineError>;

    fn load_html_string(&mut self, html: &str, base_url: Option<&str>) -> Result<(), EngineError>;

    fn go_back(&mut self) -> Result<(), EngineError>;
    fn go_forward(&mut self) -> Result<(), EngineError>;
    fn reload(&mut self) -> Result<(), EngineError>;
    fn stop_loading(&mut self) -> Result<(), EngineError>;
    fn can_go_back(&self) -> bool;
    fn can_go_forward(&self) -> bool;

    fn evaluate_javascript(&mut self, script: &str, completion: EvalCallback);

    /// Register a handler reachable from script as
    /// [`script_message_target`](Self::script_message_target)`(name)`.
    fn add_script_message_handler(&mut self, name: &str, callback: MessageCallback);

    /// Script expression whose `postMessage` reaches the handler `name`.
    fn script_message_target(&self, name: &str) -> String {
        format!("window.webkit.messageHandlers.{name}")
    }

    /// Serialized session state; `None` on engine versions without support.
    fn interaction_state(&self) -> Option<Vec<u8>>;

    fn set_interaction_state(&mut self, state: &[u8]) -> Result<(), EngineError>;

    fn scroll_offset(&self) -> (i32, i32);

    fn set_bounds(&mut self, _bounds: Rect) -> Result<(), EngineError> {
        Ok(())
    }

    fn close(&mut self) {}
}

type BridgeSlot = Arc<Mutex<Option<(WebViewJsBridge, MessageHandlerChannel)>>>;

/// Navigation and UI delegate for the native engine.
#[derive(Clone)]
pub struct NativeDelegate {
    client: PageClient,
    bridge: BridgeSlot,
}

impl NativeDelegate {
    pub fn new(client: PageClient) -> Self {
        Self {
            client,
            bridge: Arc::new(Mutex::new(None)),
        }
    }

    pub fn client(&self) -> &PageClient {
        &self.client
    }

    /// `didStartProvisionalNavigation`
    pub fn did_start_navigation(&self, url: Option<&str>) {
        self.client.on_page_started(url);
    }

    /// `didCommitNavigation`: content started arriving; apply the viewport.
    pub fn did_commit_navigation(&self, url: Option<&str>) {
        if let Some(url) = url {
            self.client.on_url_committed(url);
        }
        let script = self.client.settings().viewport_script();
        self.client.navigator().evaluate_javascript(script, None);
    }

    /// `estimatedProgress` observation.
    pub fn did_change_progress(&self, progress: f64, url: Option<&str>) {
        self.client.on_progress_changed(progress as f32, url);
    }

    /// `didFinishNavigation`
    pub fn did_finish_navigation(&self, url: Option<&str>, can_go_back: bool, can_go_forward: bool) {
        self.client.on_page_finished(url, can_go_back, can_go_forward);
    }

    /// `didFailNavigation` / `didFailProvisionalNavigation`. Cancellations
    /// are recorded without failing the page.
    pub fn did_fail_navigation(&self, code: i32, description: &str) {
        let fatal = code != URL_ERROR_CANCELLED;
        self.client.on_received_error(
            WebViewError::new(code, description),
            fatal.then(|| description.to_string()),
        );
    }

    /// `decidePolicyForNavigationAction`. Returns `true` to allow.
    pub fn decide_policy_for_navigation(&self, request: WebRequest) -> bool {
        self.client.decide_navigation(request).allows()
    }

    /// `didReceiveAuthenticationChallenge` with a server-trust failure.
    /// Returns `true` to proceed with the presented credential.
    pub fn did_receive_server_trust(&self, url: &str, host_mismatch: bool) -> bool {
        self.client.on_certificate_error(url, host_mismatch) == TlsDecision::Proceed
    }

    /// `createWebViewWithConfiguration`: no second view is ever created.
    /// Requests whose target frame is the main frame load in place; others
    /// are dropped.
    pub fn create_web_view(&self, url: &str, target_is_main_frame: bool) {
        if target_is_main_frame {
            debug!(url, "new-window request loaded in place");
            self.client.navigator().load_url(url, Headers::new());
        } else {
            debug!(url, "new-window request without a main-frame target ignored");
        }
    }

    pub fn did_change_title(&self, title: Option<String>) {
        self.client.on_received_title(title);
    }

    pub fn run_javascript_alert(&self, message: &str, callback: AlertCallback) {
        self.client.on_js_alert(message, callback);
    }

    pub fn run_javascript_text_input(
        &self,
        prompt: &str,
        default_text: Option<&str>,
        callback: PromptCallback,
    ) {
        self.client.on_js_prompt(prompt, default_text, callback);
    }

    pub fn did_receive_console_message(&self, message: &str) {
        self.client.on_console_message(message);
    }

    /// `userContentController:didReceiveScriptMessage:`
    pub fn did_receive_script_message(&self, body: &str) {
        let slot = self
            .bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match slot {
            Some((bridge, channel)) => self.client.on_bridge_payload(&bridge, &channel, body),
            None => warn!("script message before the bridge was injected"),
        }
    }

    fn install_bridge(&self, bridge: &WebViewJsBridge, channel: MessageHandlerChannel) -> bool {
        let mut slot = self.bridge.lock().unwrap_or_else(PoisonError::into_inner);
        let first = slot.is_none();
        *slot = Some((bridge.clone(), channel));
        first
    }

    fn clear_bridge(&self) {
        *self.bridge.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// [`WebEngine`] over a [`WkWebView`].
pub struct NativeEngine<V: WkWebView> {
    view: V,
    delegate: NativeDelegate,
    channel: MessageHandlerChannel,
}

impl<V: WkWebView> NativeEngine<V> {
    pub fn new(view: V, client: PageClient) -> Self {
        Self::with_delegate(view, NativeDelegate::new(client))
    }

    /// Use a delegate that was wired into the view while it was built.
    pub fn with_delegate(view: V, delegate: NativeDelegate) -> Self {
        let target = view.script_message_target(SCRIPT_MESSAGE_HANDLER);
        Self {
            view,
            delegate,
            channel: MessageHandlerChannel::new(SCRIPT_MESSAGE_HANDLER, target),
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn delegate(&self) -> &NativeDelegate {
        &self.delegate
    }
}

impl<V: WkWebView> WebEngine for NativeEngine<V> {
    fn kind(&self) -> EngineKind {
        EngineKind::Native
    }

    fn load_url(&mut self, url: &str, headers: &Headers) -> Result<(), EngineError> {
        self.view.load_request(url, "GET", headers, None)
    }

    fn load_html(
        &mut self,
        html: &str,
        base_url: Option<&str>,
        _mime_type: Option<&str>,
        _encoding: Option<&str>,
        _history_url: Option<&str>,
    ) -> Result<(), EngineError> {
        self.view.load_html_string(html, base_url)
    }

    fn post_url(&mut self, url: &str, body: &[u8]) -> Result<(), EngineError> {
        let mut headers = Headers::new();
        headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        self.view.load_request(url, "POST", &headers, Some(body))
    }

    fn go_back(&mut self) -> Result<(), EngineError> {
        self.view.go_back()
    }

    fn go_forward(&mut self) -> Result<(), EngineError> {
        self.view.go_forward()
    }

    fn reload(&mut self) -> Result<(), EngineError> {
        self.view.reload()
    }

    fn stop_loading(&mut self) -> Result<(), EngineError> {
        self.view.stop_loading()
    }

    fn can_go_back(&self) -> bool {
        self.view.can_go_back()
    }

    fn can_go_forward(&self) -> bool {
        self.view.can_go_forward()
    }

    fn evaluate_javascript(&mut self, script: &str, callback: Option<ScriptCallback>) {
        let once = OnceCallback::new(callback);
        self.view.evaluate_javascript(
            &isolate_script(script),
            Box::new(move |result| {
                once.complete(result.unwrap_or_else(|e| e));
            }),
        );
    }

    fn inject_js_bridge(&mut self, bridge: &WebViewJsBridge) {
        if self.delegate.install_bridge(bridge, self.channel.clone()) {
            let delegate = self.delegate.clone();
            self.view.add_script_message_handler(
                SCRIPT_MESSAGE_HANDLER,
                Box::new(move |body| delegate.did_receive_script_message(&body)),
            );
        }
        let script = bridge.bridge_script(&self.channel);
        self.evaluate_javascript(&script, None);
    }

    fn save_state(&mut self) -> Option<WebViewBundle> {
        self.view.interaction_state().map(WebViewBundle)
    }

    fn restore_state(&mut self, bundle: &WebViewBundle) -> Result<(), EngineError> {
        self.view.set_interaction_state(bundle.as_bytes())
    }

    fn scroll_offset(&self) -> (i32, i32) {
        self.view.scroll_offset()
    }

    fn set_bounds(&mut self, bounds: Rect) -> Result<(), EngineError> {
        if bounds.is_empty() {
            return Ok(());
        }
        self.view.set_bounds(bounds)
    }

    fn dispose(&mut self) {
        self.delegate.clear_bridge();
        self.view.close();
    }
}
