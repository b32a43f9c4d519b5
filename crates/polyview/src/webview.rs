//! A page: state, navigator, bridge and at most one attached engine.
//!
//! The host constructs a [`WebView`], builds an engine binding around
//! [`WebView::page_client`], then calls [`WebView::attach`]. From there the
//! host drives the page by calling [`WebView::pump`] on its main context
//! whenever the navigator notifies it or the engine delivered callbacks.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use polyview_common::{EngineError, Rect, ViewId};
use tracing::{debug, info, warn};

use crate::content::{ContentProvider, SCHEME};
use crate::engine::client::PageClient;
use crate::engine::{WebEngine, WebViewBundle};
use crate::events::{EventQueue, WebViewEvent};
use crate::jsbridge::WebViewJsBridge;
use crate::navigator::{NavigationCommand, WebViewNavigator};
use crate::settings::WebSettings;
use crate::state::{
    LoadingState, NavigationState, SharedState, WebContent, WebViewError, WebViewState,
};

/// Error code recorded when a navigator command fails inside the engine.
pub const COMMAND_FAILED: i32 = -1;

type Lifecycle<E> = Box<dyn FnOnce(&mut E)>;

/// A `load_html_file` read in flight. Commands queued behind it wait.
struct FileRead {
    path: String,
    result: Receiver<Result<String, String>>,
}

pub struct WebView<E: WebEngine> {
    id: ViewId,
    state: SharedState,
    events: EventQueue,
    navigator: WebViewNavigator,
    settings: WebSettings,
    client: PageClient,
    bridge: Option<WebViewJsBridge>,
    content: Option<Arc<ContentProvider>>,
    engine: Option<E>,
    file_read: Option<FileRead>,
    /// Navigation the bridge was last injected into.
    injected_for: Option<u64>,
    on_created: Option<Lifecycle<E>>,
    on_dispose: Option<Lifecycle<E>>,
}

impl<E: WebEngine> WebView<E> {
    pub fn new(content: WebContent, settings: WebSettings, navigator: WebViewNavigator) -> Self {
        let id = ViewId::new();
        let state = SharedState::new(WebViewState::new(content));
        let events = EventQueue::new();
        let client = PageClient::new(
            id.clone(),
            state.clone(),
            events.clone(),
            navigator.clone(),
            settings.clone(),
        );
        debug!(view_id = id.short(), "page created");
        Self {
            id,
            state,
            events,
            navigator,
            settings,
            client,
            bridge: None,
            content: None,
            engine: None,
            file_read: None,
            injected_for: None,
            on_created: None,
            on_dispose: None,
        }
    }

    pub fn with_bridge(mut self, bridge: WebViewJsBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Resolve `load_html_file` paths through `provider` instead of the
    /// filesystem, with a base URL on the provider's scheme.
    pub fn with_content_provider(mut self, provider: Arc<ContentProvider>) -> Self {
        self.content = Some(provider);
        self
    }

    /// Runs once, right after an engine attaches.
    pub fn on_created(mut self, callback: impl FnOnce(&mut E) + 'static) -> Self {
        self.on_created = Some(Box::new(callback));
        self
    }

    /// Runs once, right before the engine is released.
    pub fn on_dispose(mut self, callback: impl FnOnce(&mut E) + 'static) -> Self {
        self.on_dispose = Some(Box::new(callback));
        self
    }

    // -- Accessors --

    pub fn id(&self) -> &ViewId {
        &self.id
    }

    /// Callback sink for an engine binding built for this page.
    pub fn page_client(&self) -> PageClient {
        self.client.clone()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn loading_state(&self) -> LoadingState {
        self.state.loading_state()
    }

    pub fn navigation(&self) -> NavigationState {
        self.state.navigation()
    }

    pub fn errors_for_current_request(&self) -> Vec<WebViewError> {
        self.state.errors_for_current_request()
    }

    pub fn navigator(&self) -> &WebViewNavigator {
        &self.navigator
    }

    pub fn settings(&self) -> &WebSettings {
        &self.settings
    }

    pub fn bridge(&self) -> Option<&WebViewJsBridge> {
        self.bridge.as_ref()
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    pub fn is_attached(&self) -> bool {
        self.engine.is_some()
    }

    pub fn drain_events(&self) -> Vec<WebViewEvent> {
        self.events.drain()
    }

    // -- Lifecycle --

    /// Mount `engine`. A saved bundle is restored when present; otherwise
    /// the initial content is loaded ahead of any buffered commands.
    pub fn attach(&mut self, mut engine: E) -> Result<(), EngineError> {
        if self.engine.is_some() {
            return Err(EngineError::NotSupported(
                "a page holds a single engine".into(),
            ));
        }

        let saved = self.state.lock().view_state.clone();
        let restored = match saved {
            Some(bundle) => match engine.restore_state(&bundle) {
                Ok(()) => true,
                Err(e) => {
                    warn!(view_id = self.id.short(), error = %e, "state restore failed, loading content");
                    false
                }
            },
            None => false,
        };
        if !restored {
            let content = self.state.lock().content.clone();
            if let Some(command) = initial_command(content) {
                self.navigator.push_front(command);
            }
        }

        info!(
            view_id = self.id.short(),
            engine = %engine.kind(),
            restored,
            buffered = self.navigator.pending_len(),
            "engine attached"
        );
        if let Some(bridge) = &self.bridge {
            bridge.set_attached(true);
        }
        self.navigator.set_attached(true);
        self.engine = Some(engine);
        self.events.push(WebViewEvent::Created);
        if let (Some(callback), Some(engine)) = (self.on_created.take(), self.engine.as_mut()) {
            callback(engine);
        }
        self.pump();
        Ok(())
    }

    /// Release the engine. Its state is saved first so a later
    /// [`WebView::attach`] can restore it. Commands issued afterwards are
    /// buffered again.
    pub fn dispose(&mut self) {
        if self.engine.is_none() {
            return;
        }
        self.save_state();
        self.navigator.set_attached(false);
        if let Some(bridge) = &self.bridge {
            bridge.set_attached(false);
        }
        if let Some(mut engine) = self.engine.take() {
            if let Some(callback) = self.on_dispose.take() {
                callback(&mut engine);
            }
            engine.dispose();
        }
        if let Some(read) = self.file_read.take() {
            debug!(view_id = self.id.short(), path = %read.path, "html file read interrupted; requeued");
            self.navigator
                .push_front(NavigationCommand::LoadHtmlFile { path: read.path });
        }
        self.injected_for = None;
        self.events.push(WebViewEvent::Disposed);
        info!(view_id = self.id.short(), "engine disposed");
    }

    /// Apply queued commands and inject the bridge into a freshly finished
    /// page. Returns how many commands were applied.
    pub fn pump(&mut self) -> usize {
        if self.engine.is_none() {
            return 0;
        }
        let applied = self.process_commands();
        self.maybe_inject_bridge();
        applied
    }

    fn process_commands(&mut self) -> usize {
        let mut applied = 0;
        loop {
            if self.file_read.is_some() && !self.poll_file_read() {
                break;
            }
            let Some(command) = self.navigator.pop_command() else {
                break;
            };
            let reads_file = matches!(command, NavigationCommand::LoadHtmlFile { .. });
            self.apply(command);
            applied += 1;
            // The reader wakes the host once the file is in.
            if reads_file && self.file_read.is_some() {
                break;
            }
        }
        applied
    }

    fn apply(&mut self, command: NavigationCommand) {
        let name = command.name();
        if let NavigationCommand::LoadHtmlFile { path } = command {
            self.start_file_read(path);
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            self.navigator.push_front(command);
            return;
        };
        let result = match command {
            NavigationCommand::LoadUrl { url, headers } => engine.load_url(&url, &headers),
            NavigationCommand::LoadHtml {
                html,
                base_url,
                mime_type,
                encoding,
                history_url,
            } => engine.load_html(
                &html,
                base_url.as_deref(),
                mime_type.as_deref(),
                encoding.as_deref(),
                history_url.as_deref(),
            ),
            NavigationCommand::PostUrl { url, body } => engine.post_url(&url, &body),
            NavigationCommand::Reload => engine.reload(),
            NavigationCommand::StopLoading => engine.stop_loading(),
            NavigationCommand::Back => engine.go_back(),
            NavigationCommand::Forward => engine.go_forward(),
            NavigationCommand::EvaluateJavaScript { script, callback } => {
                engine.evaluate_javascript(&script, callback);
                Ok(())
            }
            NavigationCommand::LoadHtmlFile { .. } => Ok(()),
        };
        if let Err(e) = result {
            warn!(view_id = self.id.short(), command = name, error = %e, "navigator command failed");
            self.client
                .on_received_error(WebViewError::new(COMMAND_FAILED, e.to_string()), None);
        }
    }

    fn start_file_read(&mut self, path: String) {
        let (tx, rx) = mpsc::channel();
        let provider = self.content.clone();
        let file = path.clone();
        let navigator = self.navigator.clone();
        let spawned = thread::Builder::new()
            .name("polyview-file".into())
            .spawn(move || {
                let result = match provider {
                    Some(provider) => provider
                        .resolve_text(&file)
                        .ok_or_else(|| format!("asset not found: {file}")),
                    None => std::fs::read_to_string(&file).map_err(|e| e.to_string()),
                };
                if tx.send(result).is_ok() {
                    navigator.notify();
                }
            });
        match spawned {
            Ok(_) => {
                debug!(view_id = self.id.short(), path = %path, "reading html file");
                self.file_read = Some(FileRead { path, result: rx });
            }
            Err(e) => self.file_failed(&path, &e.to_string()),
        }
    }

    /// Returns `false` while the read is still running.
    fn poll_file_read(&mut self) -> bool {
        let Some(read) = &self.file_read else {
            return true;
        };
        let outcome = match read.result.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Err("file reader exited".to_string()),
        };
        let Some(read) = self.file_read.take() else {
            return true;
        };
        match outcome {
            Ok(html) => {
                let base_url = self
                    .content
                    .as_ref()
                    .map(|_| format!("{SCHEME}://localhost/{}", read.path.trim_start_matches('/')));
                self.navigator.push_front(NavigationCommand::LoadHtml {
                    html,
                    base_url,
                    mime_type: Some("text/html".into()),
                    encoding: Some("utf-8".into()),
                    history_url: None,
                });
            }
            Err(e) => self.file_failed(&read.path, &e),
        }
        true
    }

    fn file_failed(&self, path: &str, reason: &str) {
        warn!(view_id = self.id.short(), path, reason, "html file could not be loaded");
        let message = format!("failed to load {path}: {reason}");
        self.client.on_received_error(
            WebViewError::new(COMMAND_FAILED, message.clone()),
            Some(message),
        );
    }

    fn maybe_inject_bridge(&mut self) {
        let (Some(bridge), Some(engine)) = (self.bridge.as_ref(), self.engine.as_mut()) else {
            return;
        };
        let navigation_id = {
            let state = self.state.lock();
            let ready = state.loading_state().is_finished()
                && state.last_loaded_url().is_some_and(|url| !url.is_empty());
            if !ready {
                return;
            }
            state.navigation_id()
        };
        if self.injected_for == Some(navigation_id) {
            return;
        }
        debug!(view_id = self.id.short(), navigation_id, "injecting bridge");
        engine.inject_js_bridge(bridge);
        self.injected_for = Some(navigation_id);
    }

    // -- Host signals --

    /// Back press from the host. Returns whether the page consumed it.
    pub fn handle_back_press(&self) -> bool {
        if self.settings.capture_back_presses && self.navigator.can_go_back() {
            self.navigator.go_back();
            true
        } else {
            false
        }
    }

    pub fn set_bounds(&mut self, bounds: Rect) -> Result<(), EngineError> {
        match self.engine.as_mut() {
            Some(engine) => engine.set_bounds(bounds),
            None => Err(EngineError::NotAttached),
        }
    }

    /// Snapshot the engine's state into the page state and return it.
    pub fn save_state(&mut self) -> Option<WebViewBundle> {
        let engine = self.engine.as_mut()?;
        let bundle = engine.save_state();
        let offset = engine.scroll_offset();
        let mut state = self.state.lock();
        state.set_scroll_offset(offset);
        if bundle.is_some() {
            state.view_state = bundle.clone();
        }
        bundle
    }
}

impl<E: WebEngine> Drop for WebView<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn initial_command(content: WebContent) -> Option<NavigationCommand> {
    match content {
        WebContent::Url {
            url,
            additional_http_headers,
        } => Some(NavigationCommand::LoadUrl {
            url,
            headers: additional_http_headers,
        }),
        WebContent::Data {
            data,
            base_url,
            encoding,
            mime_type,
            history_url,
        } => Some(NavigationCommand::LoadHtml {
            html: data,
            base_url,
            mime_type,
            encoding: Some(encoding),
            history_url,
        }),
        WebContent::File { file_name } => Some(NavigationCommand::LoadHtmlFile { path: file_name }),
        WebContent::Post { url, post_data } => Some(NavigationCommand::PostUrl {
            url,
            body: post_data,
        }),
        WebContent::NavigatorOnly => None,
    }
}

#[cfg(test)]
mod tests;
