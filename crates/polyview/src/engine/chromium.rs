//! Binding for the embedded desktop Chromium engine.
//!
//! Browser creation blocks while the Chromium client initialises, so it is
//! moved onto its own thread and joined. Script calls reach native code by
//! navigating a hidden frame to the bridge's custom scheme; those navigations
//! are caught in `on_before_browse` and never reach the interceptor.

use polyview_common::{EngineError, Rect};
use tracing::{debug, info, warn};

use super::client::PageClient;
use super::{isolate_script, EngineKind, OnceCallback, ScriptCallback, WebEngine, WebViewBundle};
use crate::jsbridge::channel::CustomSchemeChannel;
use crate::jsbridge::WebViewJsBridge;
use crate::navigator::{AlertCallback, PromptCallback};
use crate::request::WebRequest;
use crate::security::TlsDecision;
use crate::settings::WebSettings;
use crate::state::{Headers, WebViewError};

/// `ERR_ABORTED`: the load was cancelled, usually by a newer one.
pub const ERR_ABORTED: i32 = -3;
/// `ERR_CERT_COMMON_NAME_INVALID`: certificate host mismatch.
pub const ERR_CERT_COMMON_NAME_INVALID: i32 = -200;

/// Completion for `evaluate`: the JSON result or the exception text.
pub type EvalCallback = Box<dyn FnOnce(Result<String, String>) + Send>;

/// The native Chromium browser.
pub trait CefBrowser {
    fn url(&self) -> Option<String>;

    fn load_url(&mut self, url: &str) -> Result<(), EngineError>;

    /// Navigate with a full request: method, headers and optional body.
    fn load_request(
        &mut self,
        url: &str,
        method: &str,
        headers: &Headers,
        post_data: Option<&[u8]>,
    ) -> Result<(), EngineError>;

    /// Render `html` as if it had been served from `url`.
    fn load_string(&mut self, html: &str, url: &str) -> Result<(), EngineError>;

    fn go_back(&mut self);
    fn go_forward(&mut self);
    fn reload(&mut self);
    fn stop_load(&mut self);
    fn can_go_back(&self) -> bool;
    fn can_go_forward(&self) -> bool;

    fn evaluate(&mut self, script: &str, callback: EvalCallback);

    fn set_bounds(&mut self, _bounds: Rect) -> Result<(), EngineError> {
        Ok(())
    }

    fn close(&mut self) {}
}

/// How the browser paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendering {
    /// Into its own native child window.
    Windowed,
    /// Into an off-screen buffer the host composites.
    OffScreen,
}

/// Creation parameters handed to the browser factory.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserOptions {
    pub rendering: Rendering,
    pub transparent: bool,
    pub user_agent: Option<String>,
}

impl BrowserOptions {
    pub fn from_settings(settings: &WebSettings) -> Self {
        Self {
            rendering: if settings.off_screen_rendering {
                Rendering::OffScreen
            } else {
                Rendering::Windowed
            },
            transparent: settings.transparent,
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// [`WebEngine`] over a [`CefBrowser`].
pub struct ChromiumEngine<B: CefBrowser> {
    browser: B,
    client: PageClient,
    channel: CustomSchemeChannel,
    bridge: Option<WebViewJsBridge>,
}

impl<B: CefBrowser> ChromiumEngine<B> {
    pub fn new(browser: B, client: PageClient) -> Self {
        Self {
            browser,
            client,
            channel: CustomSchemeChannel::default(),
            bridge: None,
        }
    }

    /// Create the browser with `factory` on a dedicated thread and wait for
    /// it. The factory receives the options derived from the page settings.
    pub fn create_blocking<F>(factory: F, client: PageClient) -> Result<Self, EngineError>
    where
        F: FnOnce(BrowserOptions) -> Result<B, EngineError> + Send + 'static,
        B: Send + 'static,
    {
        let options = BrowserOptions::from_settings(client.settings());
        let rendering = options.rendering;
        let handle = std::thread::Builder::new()
            .name("polyview-cef-create".into())
            .spawn(move || factory(options))?;
        let browser = handle
            .join()
            .map_err(|_| EngineError::Native("browser creation panicked".into()))??;
        info!(view_id = client.view_id().short(), ?rendering, "chromium browser created");
        Ok(Self::new(browser, client))
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    pub fn client(&self) -> &PageClient {
        &self.client
    }

    // -- Load handler --

    pub fn on_load_start(&mut self, url: Option<&str>, is_main_frame: bool) {
        if !is_main_frame {
            return;
        }
        self.client.on_page_started(url);
        let script = self.client.settings().viewport_script();
        self.evaluate_javascript(&script, None);
    }

    pub fn on_load_end(&mut self, url: Option<&str>, http_status: i32, is_main_frame: bool) {
        if !is_main_frame {
            return;
        }
        debug!(url = ?url, http_status, "load end");
        let (back, forward) = (self.browser.can_go_back(), self.browser.can_go_forward());
        self.client.on_page_finished(url, back, forward);
    }

    /// Main-frame failures fail the navigation, except aborts caused by a
    /// newer load.
    pub fn on_load_error(&mut self, code: i32, text: &str, failed_url: &str, is_main_frame: bool) {
        debug!(code, failed_url, "load error");
        let fatal = is_main_frame && code != ERR_ABORTED;
        self.client
            .on_received_error(WebViewError::new(code, text), fatal.then(|| text.to_string()));
    }

    /// `progress` in `[0.0, 1.0]`.
    pub fn on_loading_progress_change(&mut self, progress: f64) {
        let url = self.browser.url();
        self.client.on_progress_changed(progress as f32, url.as_deref());
    }

    pub fn on_address_change(&mut self, url: &str) {
        self.client.on_url_committed(url);
        self.client
            .on_history_updated(self.browser.can_go_back(), self.browser.can_go_forward());
    }

    // -- Request handler --

    /// Returns `true` to cancel the navigation.
    pub fn on_before_browse(&mut self, request: WebRequest) -> bool {
        if self.channel.is_bridge_url(&request.url) {
            match &self.bridge {
                Some(bridge) => self.client.on_bridge_payload(bridge, &self.channel, &request.url),
                None => warn!("bridge call before the bridge was injected"),
            }
            return true;
        }
        !self.client.decide_navigation(request).allows()
    }

    /// Returns `true` to suppress the popup window. With popups disabled the
    /// target is loaded in this browser instead.
    pub fn on_before_popup(&mut self, target_url: &str) -> bool {
        if !self.client.settings().disable_popup_windows {
            return false;
        }
        debug!(target_url, "popup loaded in place");
        self.client.navigator().load_url(target_url, Headers::new());
        true
    }

    /// Returns `true` to proceed past the certificate error.
    pub fn on_certificate_error(&mut self, url: &str, cert_error: i32) -> bool {
        self.client
            .on_certificate_error(url, cert_error == ERR_CERT_COMMON_NAME_INVALID)
            == TlsDecision::Proceed
    }

    // -- Display handler --

    pub fn on_title_change(&mut self, title: &str) {
        self.client.on_received_title(Some(title.to_string()));
    }

    pub fn on_console_message(&mut self, message: &str, source: &str, line: i32) {
        self.client.on_console_message(&format!("{message} ({source}:{line})"));
    }

    // -- JS dialog handler --

    pub fn on_js_alert(&mut self, message: &str, callback: AlertCallback) {
        self.client.on_js_alert(message, callback);
    }

    pub fn on_js_prompt(&mut self, message: &str, default_text: Option<&str>, callback: PromptCallback) {
        self.client.on_js_prompt(message, default_text, callback);
    }
}

impl<B: CefBrowser> WebEngine for ChromiumEngine<B> {
    fn kind(&self) -> EngineKind {
        EngineKind::Chromium
    }

    fn load_url(&mut self, url: &str, headers: &Headers) -> Result<(), EngineError> {
        if headers.is_empty() {
            self.browser.load_url(url)
        } else {
            self.browser.load_request(url, "GET", headers, None)
        }
    }

    fn load_html(
        &mut self,
        html: &str,
        base_url: Option<&str>,
        _mime_type: Option<&str>,
        _encoding: Option<&str>,
        _history_url: Option<&str>,
    ) -> Result<(), EngineError> {
        self.browser.load_string(html, base_url.unwrap_or("about:blank"))
    }

    fn post_url(&mut self, url: &str, body: &[u8]) -> Result<(), EngineError> {
        let mut headers = Headers::new();
        headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        self.browser.load_request(url, "POST", &headers, Some(body))
    }

    fn go_back(&mut self) -> Result<(), EngineError> {
        self.browser.go_back();
        Ok(())
    }

    fn go_forward(&mut self) -> Result<(), EngineError> {
        self.browser.go_forward();
        Ok(())
    }

    fn reload(&mut self) -> Result<(), EngineError> {
        self.browser.reload();
        Ok(())
    }

    fn stop_loading(&mut self) -> Result<(), EngineError> {
        self.browser.stop_load();
        Ok(())
    }

    fn can_go_back(&self) -> bool {
        self.browser.can_go_back()
    }

    fn can_go_forward(&self) -> bool {
        self.browser.can_go_forward()
    }

    fn evaluate_javascript(&mut self, script: &str, callback: Option<ScriptCallback>) {
        let once = OnceCallback::new(callback);
        self.browser.evaluate(
            &isolate_script(script),
            Box::new(move |result| {
                once.complete(result.unwrap_or_else(|e| e));
            }),
        );
    }

    fn inject_js_bridge(&mut self, bridge: &WebViewJsBridge) {
        if self.bridge.is_none() {
            debug!(scheme = self.channel.scheme(), "bridge channel installed");
            self.bridge = Some(bridge.clone());
        }
        let script = bridge.bridge_script(&self.channel);
        self.evaluate_javascript(&script, None);
    }

    /// Chromium keeps no restorable session state for embedded browsers.
    fn save_state(&mut self) -> Option<WebViewBundle> {
        None
    }

    fn restore_state(&mut self, _bundle: &WebViewBundle) -> Result<(), EngineError> {
        Err(EngineError::NotSupported("state restore".into()))
    }

    fn scroll_offset(&self) -> (i32, i32) {
        (0, 0)
    }

    fn set_bounds(&mut self, bounds: Rect) -> Result<(), EngineError> {
        if bounds.is_empty() {
            return Ok(());
        }
        self.browser.set_bounds(bounds)
    }

    fn dispose(&mut self) {
        self.bridge = None;
        self.browser.close();
    }
}
