//! Script-to-native RPC bridge.
//!
//! Script calls `window.<ns>.<method>(...)`; the stub marshals the
//! arguments into a [`JsMessage`], posts it through the engine's
//! [`channel::MessageChannel`], and the [`WebViewJsBridge`] routes it to the
//! registered [`JsMessageHandler`]. Results come back as a callback script
//! queued on the page's navigator.

pub mod channel;
pub mod dispatcher;
pub mod handler;
pub mod message;
pub mod script;


use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use polyview_config::schema::BridgeConfig;
use polyview_config::validation::is_js_identifier;
use thiserror::Error;
use tracing::{debug, warn};

pub use dispatcher::{JsMessageDispatcher, UnhandledMethodPolicy};
pub use handler::{CallMode, FnHandler, HandlerRegistration, JsMessageHandler, ResultCallback};
pub use message::{JsMessage, NO_CALLBACK};

use crate::navigator::WebViewNavigator;
use channel::MessageChannel;

/// Global the bridge installs itself under when none is configured.
pub const DEFAULT_NAMESPACE: &str = "kmpJsBridge";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("no handler registered for `{0}`")]
    HandlerNotFound(String),

    #[error("malformed bridge envelope: {0}")]
    MalformedEnvelope(String),

    #[error("`{method}` takes {min}..={max} arguments, got {got}")]
    ArgumentCount {
        method: String,
        min: usize,
        max: usize,
        got: usize,
    },

    #[error("bridge is not attached to a page")]
    NotAttached,
}

struct BridgeInner {
    namespace: String,
    dispatcher: JsMessageDispatcher,
    navigator: WebViewNavigator,
    attached: AtomicBool,
}

/// Handler registry plus the page it answers into. Cloning shares the
/// registry.
#[derive(Clone)]
pub struct WebViewJsBridge {
    inner: Arc<BridgeInner>,
}

impl WebViewJsBridge {
    pub fn new(navigator: WebViewNavigator) -> Self {
        Self::with_options(navigator, DEFAULT_NAMESPACE, UnhandledMethodPolicy::default())
    }

    /// A namespace that is not a plain JS identifier falls back to
    /// [`DEFAULT_NAMESPACE`].
    pub fn with_options(
        navigator: WebViewNavigator,
        namespace: &str,
        policy: UnhandledMethodPolicy,
    ) -> Self {
        let namespace = if is_js_identifier(namespace) {
            namespace.to_string()
        } else {
            warn!(namespace, "invalid bridge namespace, using default");
            DEFAULT_NAMESPACE.to_string()
        };
        Self {
            inner: Arc::new(BridgeInner {
                namespace,
                dispatcher: JsMessageDispatcher::new(policy),
                navigator,
                attached: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_config(navigator: WebViewNavigator, config: &BridgeConfig) -> Self {
        Self::with_options(navigator, &config.namespace, config.unhandled_method.into())
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn navigator(&self) -> &WebViewNavigator {
        &self.inner.navigator
    }

    pub fn dispatcher(&self) -> &JsMessageDispatcher {
        &self.inner.dispatcher
    }

    pub fn register_js_handler<H: JsMessageHandler + 'static>(&self, handler: H) {
        self.inner.dispatcher.register_js_handler(Arc::new(handler));
    }

    pub fn unregister_js_handler(&self, method_name: &str) -> bool {
        self.inner.dispatcher.unregister_js_handler(method_name)
    }

    pub fn can_handle(&self, method_name: &str) -> bool {
        self.inner.dispatcher.can_handle(method_name)
    }

    pub fn clear(&self) {
        self.inner.dispatcher.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.inner.attached.store(attached, Ordering::SeqCst);
    }

    /// Full injection script for `channel`: bootstrap, transport shim and
    /// one stub per handler.
    pub fn bridge_script(&self, channel: &dyn MessageChannel) -> String {
        let ns = self.namespace();
        let mut script = script::bootstrap(ns);
        script.push_str(&channel.install_script(ns));
        script.push_str(&script::handler_stubs(
            ns,
            &self.inner.dispatcher.registrations(),
        ));
        script
    }

    /// Route one decoded envelope. A result for a message carrying a
    /// callback id is delivered by queueing `onCallback` on the navigator.
    pub fn on_message(&self, message: JsMessage) -> Result<(), BridgeError> {
        if !self.is_attached() {
            warn!(method = %message.method_name, "bridge message while detached");
            return Err(BridgeError::NotAttached);
        }
        debug!(
            method = %message.method_name,
            callback_id = message.callback_id,
            "bridge message"
        );

        let callback: ResultCallback = if message.expects_result() {
            let navigator = self.inner.navigator.clone();
            let namespace = self.inner.namespace.clone();
            let callback_id = message.callback_id;
            Box::new(move |result: String| {
                navigator.evaluate_javascript(
                    script::callback_script(&namespace, callback_id, &result, None),
                    None,
                );
            })
        } else {
            Box::new(|_| {})
        };

        let navigator = self.inner.navigator.clone();
        match self.inner.dispatcher.dispatch(&message, Some(&navigator), callback) {
            Err(err @ BridgeError::HandlerNotFound(_)) if message.expects_result() => {
                navigator.evaluate_javascript(
                    script::callback_script(
                        self.namespace(),
                        message.callback_id,
                        "",
                        Some(&err.to_string()),
                    ),
                    None,
                );
                Err(err)
            }
            other => other,
        }
    }
}

impl fmt::Debug for WebViewJsBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebViewJsBridge")
            .field("namespace", &self.inner.namespace)
            .field("handlers", &self.inner.dispatcher.len())
            .field("attached", &self.is_attached())
            .finish()
    }
}
