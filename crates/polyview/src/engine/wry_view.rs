//! `wry`-backed native OS web view.
//!
//! `WryView` implements [`WkWebView`] on top of `wry::WebView`, so desktop
//! hosts can run the native engine binding on the platform web engine wry
//! wraps. wry does not expose the back/forward list, so a [`HistoryMirror`]
//! follows page loads to approximate it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use polyview_common::{EngineError, Rect};
use tracing::{debug, warn};
use wry::http::header::{HeaderMap, HeaderName, HeaderValue};
use wry::{raw_window_handle, WebViewBuilder};

use super::chromium::EvalCallback;
use super::native::{MessageCallback, NativeDelegate, WkWebView};
use crate::content::{ContentProvider, SCHEME};
use crate::request::WebRequest;
use crate::settings::WebSettings;
use crate::state::Headers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Back,
    Forward,
    Reload,
}

/// Session history reconstructed from page-load events.
#[derive(Debug, Default)]
pub struct HistoryMirror {
    entries: Vec<String>,
    index: Option<usize>,
    pending: VecDeque<Step>,
}

impl HistoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// A top-level load started for `url`.
    pub fn on_started(&mut self, url: &str) {
        match self.pending.pop_front() {
            Some(Step::Back) => {
                if let Some(i) = self.index.filter(|i| *i > 0) {
                    self.index = Some(i - 1);
                }
            }
            Some(Step::Forward) => {
                if let Some(i) = self.index.filter(|i| i + 1 < self.entries.len()) {
                    self.index = Some(i + 1);
                }
            }
            Some(Step::Reload) => {}
            None => {
                if self.current() == Some(url) {
                    return;
                }
                let keep = self.index.map_or(0, |i| i + 1);
                self.entries.truncate(keep);
                self.entries.push(url.to_string());
                self.index = Some(self.entries.len() - 1);
            }
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.index.and_then(|i| self.entries.get(i)).map(String::as_str)
    }

    pub fn can_go_back(&self) -> bool {
        self.index.is_some_and(|i| i > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.index.is_some_and(|i| i + 1 < self.entries.len())
    }

    fn expect(&mut self, step: Step) {
        self.pending.push_back(step);
    }
}

type SharedHistory = Arc<Mutex<HistoryMirror>>;
type HandlerSlot = Arc<Mutex<Option<MessageCallback>>>;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn native(e: wry::Error) -> EngineError {
    EngineError::Native(e.to_string())
}

/// Native OS web view driven through wry.
pub struct WryView {
    webview: wry::WebView,
    history: SharedHistory,
    message_handler: HandlerSlot,
}

impl WryView {
    /// Build the view as a child of `window`, wiring every wry callback into
    /// `delegate`.
    pub fn build<W: raw_window_handle::HasWindowHandle>(
        window: &W,
        bounds: Rect,
        settings: &WebSettings,
        delegate: NativeDelegate,
        content: Option<Arc<ContentProvider>>,
    ) -> Result<Self, EngineError> {
        let history: SharedHistory = Arc::new(Mutex::new(HistoryMirror::new()));
        let message_handler: HandlerSlot = Arc::new(Mutex::new(None));

        let mut builder = WebViewBuilder::new()
            .with_bounds(to_wry_rect(bounds))
            .with_transparent(settings.transparent)
            .with_devtools(settings.devtools)
            .with_focused(false);

        if let Some(ua) = &settings.user_agent {
            builder = builder.with_user_agent(ua);
        }

        builder = attach_ipc_handler(builder, Arc::clone(&message_handler));
        builder = attach_page_load_handler(builder, delegate.clone(), Arc::clone(&history));
        builder = attach_title_handler(builder, delegate.clone());
        builder = attach_navigation_handler(builder, delegate.clone());
        builder = attach_new_window_handler(builder, delegate);
        if let Some(provider) = content {
            builder = attach_custom_protocol(builder, provider);
        }

        let webview = builder
            .with_html("<html><body></body></html>")
            .build_as_child(window)
            .map_err(native)?;

        if (settings.zoom_level - 1.0).abs() > f64::EPSILON {
            webview.zoom(settings.zoom_level).map_err(native)?;
        }
        debug!("wry view created");

        Ok(Self {
            webview,
            history,
            message_handler,
        })
    }

    pub fn inner(&self) -> &wry::WebView {
        &self.webview
    }

    pub fn set_visible(&self, visible: bool) -> Result<(), EngineError> {
        self.webview.set_visible(visible).map_err(native)
    }

    pub fn open_devtools(&self) {
        self.webview.open_devtools();
    }

    fn run_script(&self, script: &str) -> Result<(), EngineError> {
        self.webview.evaluate_script(script).map_err(native)
    }
}

fn attach_ipc_handler<'a>(builder: WebViewBuilder<'a>, slot: HandlerSlot) -> WebViewBuilder<'a> {
    builder.with_ipc_handler(move |request| {
        let body = request.body().to_string();

        if serde_json::from_str::<serde_json::Value>(&body).is_err() {
            warn!(body_len = body.len(), "IPC message rejected: invalid JSON");
            return;
        }

        match lock(&slot).as_ref() {
            Some(handler) => handler(body),
            None => debug!(body_len = body.len(), "IPC message with no handler"),
        }
    })
}

fn attach_page_load_handler<'a>(
    builder: WebViewBuilder<'a>,
    delegate: NativeDelegate,
    history: SharedHistory,
) -> WebViewBuilder<'a> {
    builder.with_on_page_load_handler(move |event, url| match event {
        wry::PageLoadEvent::Started => {
            lock(&history).on_started(&url);
            delegate.did_start_navigation(Some(&url));
            delegate.did_commit_navigation(Some(&url));
        }
        wry::PageLoadEvent::Finished => {
            let (back, forward) = {
                let history = lock(&history);
                (history.can_go_back(), history.can_go_forward())
            };
            delegate.did_finish_navigation(Some(&url), back, forward);
        }
    })
}

fn attach_title_handler<'a>(builder: WebViewBuilder<'a>, delegate: NativeDelegate) -> WebViewBuilder<'a> {
    builder.with_document_title_changed_handler(move |title| {
        delegate.did_change_title(Some(title));
    })
}

fn attach_navigation_handler<'a>(
    builder: WebViewBuilder<'a>,
    delegate: NativeDelegate,
) -> WebViewBuilder<'a> {
    builder.with_navigation_handler(move |url| {
        delegate.decide_policy_for_navigation(WebRequest::new(url))
    })
}

fn attach_new_window_handler<'a>(
    builder: WebViewBuilder<'a>,
    delegate: NativeDelegate,
) -> WebViewBuilder<'a> {
    builder.with_new_window_req_handler(move |url| {
        // wry reports no target frame; popups replace the current page.
        delegate.create_web_view(&url, true);
        false
    })
}

fn attach_custom_protocol<'a>(
    builder: WebViewBuilder<'a>,
    provider: Arc<ContentProvider>,
) -> WebViewBuilder<'a> {
    builder.with_custom_protocol(SCHEME.to_string(), move |_webview_id, request| {
        provider.serve(&request.uri().to_string())
    })
}

/// Convert a logical layout rect into wry's bounds.
pub fn to_wry_rect(rect: Rect) -> wry::Rect {
    wry::Rect {
        position: wry::dpi::Position::Logical(wry::dpi::LogicalPosition::new(rect.x, rect.y)),
        size: wry::dpi::Size::Logical(wry::dpi::LogicalSize::new(rect.width, rect.height)),
    }
}

/// Convert request headers, skipping any that are not valid HTTP.
fn to_header_map(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid request header"),
        }
    }
    map
}

impl WkWebView for WryView {
    fn url(&self) -> Option<String> {
        self.webview.url().ok()
    }

    fn load_request(
        &mut self,
        url: &str,
        method: &str,
        headers: &Headers,
        body: Option<&[u8]>,
    ) -> Result<(), EngineError> {
        if body.is_some() || !method.eq_ignore_ascii_case("GET") {
            return Err(EngineError::NotSupported(format!("{method} navigation")));
        }
        if headers.is_empty() {
            self.webview.load_url(url).map_err(native)
        } else {
            self.webview
                .load_url_with_headers(url, to_header_map(headers))
                .map_err(native)
        }
    }

    fn load_html_string(&mut self, html: &str, base_url: Option<&str>) -> Result<(), EngineError> {
        if let Some(base_url) = base_url {
            debug!(base_url, "base URL ignored for inline HTML");
        }
        self.webview.load_html(html).map_err(native)
    }

    fn go_back(&mut self) -> Result<(), EngineError> {
        lock(&self.history).expect(Step::Back);
        self.run_script("history.back();")
    }

    fn go_forward(&mut self) -> Result<(), EngineError> {
        lock(&self.history).expect(Step::Forward);
        self.run_script("history.forward();")
    }

    fn reload(&mut self) -> Result<(), EngineError> {
        lock(&self.history).expect(Step::Reload);
        self.run_script("location.reload();")
    }

    fn stop_loading(&mut self) -> Result<(), EngineError> {
        self.run_script("window.stop();")
    }

    fn can_go_back(&self) -> bool {
        lock(&self.history).can_go_back()
    }

    fn can_go_forward(&self) -> bool {
        lock(&self.history).can_go_forward()
    }

    fn evaluate_javascript(&mut self, script: &str, completion: EvalCallback) {
        let completion = Arc::new(Mutex::new(Some(completion)));
        let on_result = Arc::clone(&completion);
        let result = self.webview.evaluate_script_with_callback(script, move |value| {
            if let Some(done) = lock(&on_result).take() {
                done(Ok(value));
            }
        });
        if let Err(e) = result {
            if let Some(done) = lock(&completion).take() {
                done(Err(e.to_string()));
            }
        }
    }

    fn add_script_message_handler(&mut self, name: &str, callback: MessageCallback) {
        debug!(name, "script message handler routed through window.ipc");
        *lock(&self.message_handler) = Some(callback);
    }

    /// wry delivers every script message through its single IPC channel.
    fn script_message_target(&self, _name: &str) -> String {
        "window.ipc".to_string()
    }

    fn interaction_state(&self) -> Option<Vec<u8>> {
        None
    }

    fn set_interaction_state(&mut self, _state: &[u8]) -> Result<(), EngineError> {
        Err(EngineError::NotSupported("interaction state".into()))
    }

    fn scroll_offset(&self) -> (i32, i32) {
        (0, 0)
    }

    fn set_bounds(&mut self, bounds: Rect) -> Result<(), EngineError> {
        self.webview.set_bounds(to_wry_rect(bounds)).map_err(native)
    }
}
