//! Binding for the mobile OS web engine.
//!
//! The native glue owns a `WebViewClient`/`WebChromeClient` pair and
//! forwards every callback to the matching `on_*` method here.

use polyview_common::EngineError;
use tracing::{debug, warn};

use super::client::PageClient;
use super::{isolate_script, EngineKind, OnceCallback, ScriptCallback, WebEngine, WebViewBundle};
use crate::jsbridge::channel::JsInterfaceChannel;
use crate::jsbridge::WebViewJsBridge;
use crate::navigator::{AlertCallback, PromptCallback};
use crate::request::WebRequest;
use crate::security::TlsDecision;
use crate::settings::WebSettings;
use crate::state::{Headers, WebViewError};

/// `ERROR_HOST_LOOKUP`
pub const ERROR_HOST_LOOKUP: i32 = -2;
/// `ERROR_CONNECT`
pub const ERROR_CONNECT: i32 = -6;

const NETWORK_FAILURE: &str = "network unavailable, check the connection and retry";

/// Receives `postMessage` payloads from a script interface object.
pub type InterfaceCallback = Box<dyn Fn(String) + Send + Sync>;

/// The native mobile web view.
pub trait MobileWebView {
    fn apply_settings(&mut self, _settings: &WebSettings) {}

    fn url(&self) -> Option<String>;

    fn load_url(&mut self, url: &str, headers: &Headers) -> Result<(), EngineError>;

    fn load_data_with_base_url(
        &mut self,
        base_url: Option<&str>,
        data: &str,
        mime_type: &str,
        encoding: &str,
        history_url: Option<&str>,
    ) -> Result<(), EngineError>;

    /// `application/x-www-form-urlencoded` POST of the raw body.
    fn post_url(&mut self, url: &str, body: &[u8]) -> Result<(), EngineError>;

    fn go_back(&mut self);
    fn go_forward(&mut self);
    fn reload(&mut self);
    fn stop_loading(&mut self);
    fn can_go_back(&self) -> bool;
    fn can_go_forward(&self) -> bool;

    /// Evaluate script; `callback` receives the JSON-encoded result.
    fn evaluate_javascript(&mut self, script: &str, callback: ScriptCallback) -> Result<(), EngineError>;

    /// Expose an object named `name` whose `call(message)` method invokes
    /// `callback`.
    fn add_javascript_interface(&mut self, name: &str, callback: InterfaceCallback);

    fn save_state(&mut self) -> Option<Vec<u8>>;
    fn restore_state(&mut self, bytes: &[u8]) -> Result<(), EngineError>;
    fn scroll_offset(&self) -> (i32, i32);
}

/// [`WebEngine`] over a [`MobileWebView`].
pub struct MobileEngine<V: MobileWebView> {
    view: V,
    client: PageClient,
    channel: JsInterfaceChannel,
    bridge_installed: bool,
}

impl<V: MobileWebView> MobileEngine<V> {
    pub fn new(mut view: V, client: PageClient) -> Self {
        view.apply_settings(client.settings());
        Self {
            view,
            client,
            channel: JsInterfaceChannel::default(),
            bridge_installed: false,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn client(&self) -> &PageClient {
        &self.client
    }

    // -- WebViewClient --

    pub fn on_page_started(&mut self, url: Option<&str>) {
        self.client.on_page_started(url);
        let script = self.client.settings().viewport_script();
        self.evaluate_javascript(&script, None);
    }

    pub fn on_page_finished(&mut self, url: Option<&str>) {
        let (back, forward) = (self.view.can_go_back(), self.view.can_go_forward());
        self.client.on_page_finished(url, back, forward);
    }

    pub fn do_update_visited_history(&mut self, url: Option<&str>, is_reload: bool) {
        debug!(url = ?url, is_reload, "visited history updated");
        if let Some(url) = url {
            self.client.on_url_committed(url);
        }
        self.client
            .on_history_updated(self.view.can_go_back(), self.view.can_go_forward());
    }

    /// Errors on the main frame that mean the network is gone fail the
    /// whole navigation; anything else is only recorded.
    pub fn on_received_error(&mut self, code: i32, description: &str, is_for_main_frame: bool) {
        let fatal = is_for_main_frame
            && (matches!(description, "INTERNET_DISCONNECTED" | "ADDRESS_UNREACHABLE")
                || matches!(code, ERROR_HOST_LOOKUP | ERROR_CONNECT));
        self.client.on_received_error(
            WebViewError::new(code, description),
            fatal.then(|| NETWORK_FAILURE.to_string()),
        );
    }

    /// Returns `true` when the engine must NOT load the request itself.
    pub fn should_override_url_loading(&mut self, request: WebRequest) -> bool {
        !self.client.decide_navigation(request).allows()
    }

    /// Returns `true` to proceed past the certificate error.
    pub fn on_received_ssl_error(&mut self, url: &str, id_mismatch: bool) -> bool {
        self.client.on_certificate_error(url, id_mismatch) == TlsDecision::Proceed
    }

    // -- WebChromeClient --

    /// `new_progress` is the engine's 0-100 progress value.
    pub fn on_progress_changed(&mut self, new_progress: i32) {
        let url = self.view.url();
        self.client
            .on_progress_changed(new_progress as f32 / 100.0, url.as_deref());
    }

    pub fn on_received_title(&mut self, title: Option<String>) {
        self.client.on_received_title(title);
    }

    pub fn on_console_message(&mut self, message: &str) {
        self.client.on_console_message(message);
    }

    pub fn on_js_alert(&mut self, message: &str, callback: AlertCallback) {
        self.client.on_js_alert(message, callback);
    }

    pub fn on_js_prompt(&mut self, message: &str, default_text: Option<&str>, callback: PromptCallback) {
        self.client.on_js_prompt(message, default_text, callback);
    }

    pub fn on_scroll_changed(&mut self, x: i32, y: i32) {
        self.client.on_scroll_changed(x, y);
    }
}

impl<V: MobileWebView> WebEngine for MobileEngine<V> {
    fn kind(&self) -> EngineKind {
        EngineKind::Mobile
    }

    fn load_url(&mut self, url: &str, headers: &Headers) -> Result<(), EngineError> {
        self.view.load_url(url, headers)
    }

    fn load_html(
        &mut self,
        html: &str,
        base_url: Option<&str>,
        mime_type: Option<&str>,
        encoding: Option<&str>,
        history_url: Option<&str>,
    ) -> Result<(), EngineError> {
        self.view.load_data_with_base_url(
            base_url,
            html,
            mime_type.unwrap_or("text/html"),
            encoding.unwrap_or("utf-8"),
            history_url,
        )
    }

    fn post_url(&mut self, url: &str, body: &[u8]) -> Result<(), EngineError> {
        self.view.post_url(url, body)
    }

    fn go_back(&mut self) -> Result<(), EngineError> {
        self.view.go_back();
        Ok(())
    }

    fn go_forward(&mut self) -> Result<(), EngineError> {
        self.view.go_forward();
        Ok(())
    }

    fn reload(&mut self) -> Result<(), EngineError> {
        self.view.reload();
        Ok(())
    }

    fn stop_loading(&mut self) -> Result<(), EngineError> {
        self.view.stop_loading();
        Ok(())
    }

    fn can_go_back(&self) -> bool {
        self.view.can_go_back()
    }

    fn can_go_forward(&self) -> bool {
        self.view.can_go_forward()
    }

    fn evaluate_javascript(&mut self, script: &str, callback: Option<ScriptCallback>) {
        let once = OnceCallback::new(callback);
        if let Err(e) = self
            .view
            .evaluate_javascript(&isolate_script(script), once.as_callback())
        {
            warn!(error = %e, "script evaluation failed");
            once.complete(e.to_string());
        }
    }

    fn inject_js_bridge(&mut self, bridge: &WebViewJsBridge) {
        if !self.bridge_installed {
            let client = self.client.clone();
            let bridge_for_calls = bridge.clone();
            let channel = self.channel.clone();
            self.view.add_javascript_interface(
                self.channel.object_name(),
                Box::new(move |payload| {
                    client.on_bridge_payload(&bridge_for_calls, &channel, &payload);
                }),
            );
            self.bridge_installed = true;
        }
        let script = bridge.bridge_script(&self.channel);
        self.evaluate_javascript(&script, None);
    }

    fn save_state(&mut self) -> Option<WebViewBundle> {
        self.view.save_state().map(WebViewBundle)
    }

    fn restore_state(&mut self, bundle: &WebViewBundle) -> Result<(), EngineError> {
        self.view.restore_state(bundle.as_bytes())
    }

    fn scroll_offset(&self) -> (i32, i32) {
        self.view.scroll_offset()
    }
}
