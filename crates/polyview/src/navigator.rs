//! Command surface for a page.
//!
//! `WebViewNavigator` is a cheap cloneable handle. Commands issued on it are
//! queued and picked up by the page that owns the attached engine; while no
//! engine is attached they stay buffered and are replayed in issuance order
//! once one attaches.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::engine::ScriptCallback;
use crate::request::RequestInterceptor;
use crate::state::Headers;

/// Completion for an `alert()` dialog. `true` means the dialog was dismissed
/// normally.
pub type AlertCallback = Box<dyn FnOnce(bool) + Send>;

/// Completion for a `prompt()` dialog: `(confirmed, entered_text)`.
pub type PromptCallback = Box<dyn FnOnce(bool, Option<String>) + Send>;

/// Host-side presenter for page dialogs.
///
/// The engine keeps page script suspended until the callback fires. There is
/// no timeout: a handler that drops the callback without calling it leaves
/// the page blocked.
pub trait DialogHandler: Send + Sync {
    fn alert(&self, message: &str, callback: AlertCallback);
    fn prompt(&self, message: &str, default_text: Option<&str>, callback: PromptCallback);
}

/// A queued navigator command.
pub enum NavigationCommand {
    LoadUrl {
        url: String,
        headers: Headers,
    },
    LoadHtml {
        html: String,
        base_url: Option<String>,
        mime_type: Option<String>,
        encoding: Option<String>,
        history_url: Option<String>,
    },
    LoadHtmlFile {
        path: String,
    },
    PostUrl {
        url: String,
        body: Vec<u8>,
    },
    Reload,
    StopLoading,
    Back,
    Forward,
    EvaluateJavaScript {
        script: String,
        callback: Option<ScriptCallback>,
    },
}

impl NavigationCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            NavigationCommand::LoadUrl { .. } => "load_url",
            NavigationCommand::LoadHtml { .. } => "load_html",
            NavigationCommand::LoadHtmlFile { .. } => "load_html_file",
            NavigationCommand::PostUrl { .. } => "post_url",
            NavigationCommand::Reload => "reload",
            NavigationCommand::StopLoading => "stop_loading",
            NavigationCommand::Back => "go_back",
            NavigationCommand::Forward => "go_forward",
            NavigationCommand::EvaluateJavaScript { .. } => "evaluate_javascript",
        }
    }
}

impl fmt::Debug for NavigationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationCommand::LoadUrl { url, headers } => f
                .debug_struct("LoadUrl")
                .field("url", url)
                .field("headers", headers)
                .finish(),
            NavigationCommand::LoadHtml {
                html,
                base_url,
                mime_type,
                encoding,
                history_url,
            } => f
                .debug_struct("LoadHtml")
                .field("html_len", &html.len())
                .field("base_url", base_url)
                .field("mime_type", mime_type)
                .field("encoding", encoding)
                .field("history_url", history_url)
                .finish(),
            NavigationCommand::LoadHtmlFile { path } => {
                f.debug_struct("LoadHtmlFile").field("path", path).finish()
            }
            NavigationCommand::PostUrl { url, body } => f
                .debug_struct("PostUrl")
                .field("url", url)
                .field("body_len", &body.len())
                .finish(),
            NavigationCommand::Reload => f.write_str("Reload"),
            NavigationCommand::StopLoading => f.write_str("StopLoading"),
            NavigationCommand::Back => f.write_str("Back"),
            NavigationCommand::Forward => f.write_str("Forward"),
            NavigationCommand::EvaluateJavaScript { script, callback } => f
                .debug_struct("EvaluateJavaScript")
                .field("script_len", &script.len())
                .field("has_callback", &callback.is_some())
                .finish(),
        }
    }
}

type Notifier = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct NavigatorInner {
    pending: VecDeque<NavigationCommand>,
    attached: bool,
    can_go_back: bool,
    can_go_forward: bool,
    interceptor: Option<Arc<dyn RequestInterceptor>>,
    dialogs: Option<Arc<dyn DialogHandler>>,
    notifier: Option<Notifier>,
}

/// Cloneable command handle for one page.
#[derive(Clone, Default)]
pub struct WebViewNavigator {
    inner: Arc<Mutex<NavigatorInner>>,
}

impl fmt::Debug for WebViewNavigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("WebViewNavigator")
            .field("pending", &inner.pending.len())
            .field("attached", &inner.attached)
            .field("can_go_back", &inner.can_go_back)
            .field("can_go_forward", &inner.can_go_forward)
            .field("has_interceptor", &inner.interceptor.is_some())
            .finish()
    }
}

impl WebViewNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NavigatorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, command: NavigationCommand) {
        let notifier = {
            let mut inner = self.lock();
            if inner.attached {
                debug!(command = command.name(), "navigator command queued");
            } else {
                debug!(
                    command = command.name(),
                    buffered = inner.pending.len() + 1,
                    "navigator command buffered until an engine attaches"
                );
            }
            inner.pending.push_back(command);
            if inner.attached {
                inner.notifier.clone()
            } else {
                None
            }
        };
        if let Some(notify) = notifier {
            notify();
        }
    }

    // -- Commands --

    /// Load a URL with extra request headers.
    pub fn load_url(&self, url: impl Into<String>, headers: Headers) {
        self.push(NavigationCommand::LoadUrl {
            url: url.into(),
            headers,
        });
    }

    /// Load markup directly.
    pub fn load_html(
        &self,
        html: impl Into<String>,
        base_url: Option<String>,
        mime_type: Option<String>,
        encoding: Option<String>,
        history_url: Option<String>,
    ) {
        self.push(NavigationCommand::LoadHtml {
            html: html.into(),
            base_url,
            mime_type,
            encoding,
            history_url,
        });
    }

    /// Load a bundled HTML file. The file is read off the main context and
    /// the commands issued after it wait until it has been loaded.
    pub fn load_html_file(&self, path: impl Into<String>) {
        self.push(NavigationCommand::LoadHtmlFile { path: path.into() });
    }

    /// POST `body` to `url`.
    pub fn post_url(&self, url: impl Into<String>, body: Vec<u8>) {
        self.push(NavigationCommand::PostUrl {
            url: url.into(),
            body,
        });
    }

    pub fn reload(&self) {
        self.push(NavigationCommand::Reload);
    }

    pub fn stop_loading(&self) {
        self.push(NavigationCommand::StopLoading);
    }

    pub fn go_back(&self) {
        self.push(NavigationCommand::Back);
    }

    pub fn go_forward(&self) {
        self.push(NavigationCommand::Forward);
    }

    /// Evaluate `script` in the page. `callback` receives the result, or the
    /// error text when evaluation failed.
    pub fn evaluate_javascript(&self, script: impl Into<String>, callback: Option<ScriptCallback>) {
        self.push(NavigationCommand::EvaluateJavaScript {
            script: script.into(),
            callback,
        });
    }

    // -- History flags --

    pub fn can_go_back(&self) -> bool {
        self.lock().can_go_back
    }

    pub fn can_go_forward(&self) -> bool {
        self.lock().can_go_forward
    }

    pub(crate) fn set_history(&self, can_go_back: bool, can_go_forward: bool) {
        let mut inner = self.lock();
        inner.can_go_back = can_go_back;
        inner.can_go_forward = can_go_forward;
    }

    // -- Hooks --

    /// Install or clear the request interceptor. Without one every
    /// navigation is allowed.
    pub fn set_request_interceptor(&self, interceptor: Option<Arc<dyn RequestInterceptor>>) {
        self.lock().interceptor = interceptor;
    }

    pub fn request_interceptor(&self) -> Option<Arc<dyn RequestInterceptor>> {
        self.lock().interceptor.clone()
    }

    pub fn set_dialog_handler(&self, handler: Option<Arc<dyn DialogHandler>>) {
        self.lock().dialogs = handler;
    }

    /// Called whenever a command is queued while an engine is attached.
    /// Hosts use it to wake their main loop.
    pub fn set_command_notifier(&self, notifier: Option<Arc<dyn Fn() + Send + Sync>>) {
        self.lock().notifier = notifier;
    }

    /// Route a page `alert()` to the dialog handler. Without a handler the
    /// alert is acknowledged immediately.
    pub fn on_js_alert(&self, message: &str, callback: AlertCallback) {
        let handler = self.lock().dialogs.clone();
        match handler {
            Some(handler) => handler.alert(message, callback),
            None => {
                debug!(message, "alert with no dialog handler; acknowledging");
                callback(true);
            }
        }
    }

    /// Route a page `prompt()` to the dialog handler. Without a handler the
    /// prompt is cancelled.
    pub fn on_js_prompt(&self, message: &str, default_text: Option<&str>, callback: PromptCallback) {
        let handler = self.lock().dialogs.clone();
        match handler {
            Some(handler) => handler.prompt(message, default_text, callback),
            None => {
                debug!(message, "prompt with no dialog handler; cancelling");
                callback(false, None);
            }
        }
    }

    // -- Engine side --

    pub fn is_attached(&self) -> bool {
        self.lock().attached
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Wake the host without queuing anything. Does nothing while detached.
    pub(crate) fn notify(&self) {
        let notifier = {
            let inner = self.lock();
            inner.notifier.clone().filter(|_| inner.attached)
        };
        if let Some(notify) = notifier {
            notify();
        }
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.lock().attached = attached;
    }

    /// Pop the oldest queued command.
    pub(crate) fn pop_command(&self) -> Option<NavigationCommand> {
        self.lock().pending.pop_front()
    }

    /// Put a command back at the head of the queue.
    pub(crate) fn push_front(&self, command: NavigationCommand) {
        self.lock().pending.push_front(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn names(navigator: &WebViewNavigator) -> Vec<&'static str> {
        std::iter::from_fn(|| navigator.pop_command())
            .map(|c| c.name())
            .collect()
    }

    #[test]
    fn commands_are_fifo() {
        let navigator = WebViewNavigator::new();
        navigator.load_url("https://a.test", Headers::new());
        navigator.reload();
        navigator.evaluate_javascript("1 + 1", None);
        navigator.go_back();

        assert_eq!(navigator.pending_len(), 4);
        assert_eq!(
            names(&navigator),
            vec!["load_url", "reload", "evaluate_javascript", "go_back"]
        );
    }

    #[test]
    fn clones_share_queue_and_flags() {
        let navigator = WebViewNavigator::new();
        let clone = navigator.clone();
        clone.stop_loading();
        navigator.set_history(true, false);

        assert_eq!(navigator.pending_len(), 1);
        assert!(clone.can_go_back());
        assert!(!clone.can_go_forward());
    }

    #[test]
    fn notifier_fires_only_when_attached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let navigator = WebViewNavigator::new();
        let counter = Arc::clone(&hits);
        navigator.set_command_notifier(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        navigator.reload();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        navigator.set_attached(true);
        navigator.reload();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_wakes_without_queuing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let navigator = WebViewNavigator::new();
        let counter = Arc::clone(&hits);
        navigator.set_command_notifier(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        navigator.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        navigator.set_attached(true);
        navigator.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(navigator.pending_len(), 0);
    }

    #[test]
    fn push_front_requeues_at_head() {
        let navigator = WebViewNavigator::new();
        navigator.reload();
        navigator.push_front(NavigationCommand::StopLoading);
        assert_eq!(names(&navigator), vec!["stop_loading", "reload"]);
    }

    #[test]
    fn dialogs_default_without_handler() {
        let navigator = WebViewNavigator::new();
        let alerted = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&alerted);
        navigator.on_js_alert("hi", Box::new(move |ok| *slot.lock().unwrap() = Some(ok)));
        assert_eq!(*alerted.lock().unwrap(), Some(true));

        let prompted = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&prompted);
        navigator.on_js_prompt(
            "name?",
            Some("anon"),
            Box::new(move |ok, text| *slot.lock().unwrap() = Some((ok, text))),
        );
        assert_eq!(*prompted.lock().unwrap(), Some((false, None)));
    }

    struct EchoDialogs;

    impl DialogHandler for EchoDialogs {
        fn alert(&self, _message: &str, callback: AlertCallback) {
            callback(false);
        }

        fn prompt(&self, message: &str, _default_text: Option<&str>, callback: PromptCallback) {
            callback(true, Some(message.to_uppercase()));
        }
    }

    #[test]
    fn dialogs_route_to_handler() {
        let navigator = WebViewNavigator::new();
        navigator.set_dialog_handler(Some(Arc::new(EchoDialogs)));

        let prompted = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&prompted);
        navigator.on_js_prompt(
            "name?",
            None,
            Box::new(move |ok, text| *slot.lock().unwrap() = Some((ok, text))),
        );
        assert_eq!(
            *prompted.lock().unwrap(),
            Some((true, Some("NAME?".to_string())))
        );
    }

    #[test]
    fn debug_hides_payloads() {
        let command = NavigationCommand::PostUrl {
            url: "https://a.test".into(),
            body: b"secret=1".to_vec(),
        };
        let text = format!("{command:?}");
        assert!(text.contains("body_len"));
        assert!(!text.contains("secret"));
    }
}
