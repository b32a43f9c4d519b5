//! Engine adapters.
//!
//! [`WebEngine`] is the capability set every native browser engine binding
//! implements. Three bindings exist, each generic over a thin handle trait
//! describing the native object it drives:
//!
//! - [`mobile::MobileEngine`] for the mobile OS web engine,
//! - [`chromium::ChromiumEngine`] for the embedded desktop Chromium engine,
//! - [`native::NativeEngine`] for the native OS web engine (the wry-backed
//!   [`wry_view::WryView`] is one such handle).
//!
//! Callback bookkeeping common to all three lives in [`client::PageClient`].

pub mod chromium;
pub mod client;
pub mod mobile;
pub mod native;
pub mod wry_view;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use polyview_common::{EngineError, Rect};

use crate::jsbridge::WebViewJsBridge;
use crate::state::Headers;

/// Which kind of native engine a binding drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Mobile,
    Chromium,
    Native,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Mobile => write!(f, "mobile"),
            EngineKind::Chromium => write!(f, "chromium"),
            EngineKind::Native => write!(f, "native"),
        }
    }
}

/// Opaque saved engine state. Only the engine that produced it can read it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WebViewBundle(pub Vec<u8>);

impl WebViewBundle {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Receives the result of a script evaluation, or the error text.
pub type ScriptCallback = Box<dyn FnOnce(String) + Send>;

/// A script callback that can be handed to native code and to an error path
/// at the same time; whichever completes first wins, the rest are dropped.
#[derive(Clone, Default)]
pub(crate) struct OnceCallback(Arc<Mutex<Option<ScriptCallback>>>);

impl OnceCallback {
    pub(crate) fn new(callback: Option<ScriptCallback>) -> Self {
        Self(Arc::new(Mutex::new(callback)))
    }

    /// Deliver `value` if nothing has been delivered yet.
    pub(crate) fn complete(&self, value: String) -> bool {
        let callback = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        match callback {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    pub(crate) fn as_callback(&self) -> ScriptCallback {
        let this = self.clone();
        Box::new(move |value| {
            this.complete(value);
        })
    }
}

/// Wrap `script` in a function scope so its declarations do not leak into
/// the page.
pub fn isolate_script(script: &str) -> String {
    format!("(function() {{\n{script}\n}})();")
}

/// Capability set of a native browser engine binding.
pub trait WebEngine {
    fn kind(&self) -> EngineKind;

    fn load_url(&mut self, url: &str, headers: &Headers) -> Result<(), EngineError>;

    fn load_html(
        &mut self,
        html: &str,
        base_url: Option<&str>,
        mime_type: Option<&str>,
        encoding: Option<&str>,
        history_url: Option<&str>,
    ) -> Result<(), EngineError>;

    /// POST `body` to `url`, byte-for-byte.
    fn post_url(&mut self, url: &str, body: &[u8]) -> Result<(), EngineError>;

    fn go_back(&mut self) -> Result<(), EngineError>;

    fn go_forward(&mut self) -> Result<(), EngineError>;

    fn reload(&mut self) -> Result<(), EngineError>;

    fn stop_loading(&mut self) -> Result<(), EngineError>;

    fn can_go_back(&self) -> bool;

    fn can_go_forward(&self) -> bool;

    /// Evaluate `script` wrapped by [`isolate_script`]. `callback`, when
    /// given, is invoked exactly once with the result or the error text.
    fn evaluate_javascript(&mut self, script: &str, callback: Option<ScriptCallback>);

    /// Install the bridge's native channel (once) and evaluate its scripts.
    fn inject_js_bridge(&mut self, bridge: &WebViewJsBridge);

    fn save_state(&mut self) -> Option<WebViewBundle>;

    fn restore_state(&mut self, bundle: &WebViewBundle) -> Result<(), EngineError>;

    fn scroll_offset(&self) -> (i32, i32);

    /// Layout size hint from the host.
    fn set_bounds(&mut self, _bounds: Rect) -> Result<(), EngineError> {
        Ok(())
    }

    /// Release the native engine. Further calls may fail.
    fn dispose(&mut self) {}
}

/// Shared helpers for engine tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::ScriptCallback;

    /// Collects everything delivered to script callbacks.
    #[derive(Clone, Default)]
    pub(crate) struct Results(pub Arc<Mutex<Vec<String>>>);

    impl Results {
        pub(crate) fn callback(&self) -> ScriptCallback {
            let sink = Arc::clone(&self.0);
            Box::new(move |value| sink.lock().unwrap().push(value))
        }

        pub(crate) fn values(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolate_script_wraps_in_function_scope() {
        assert_eq!(
            isolate_script("var x = 1; return x;"),
            "(function() {\nvar x = 1; return x;\n})();"
        );
    }

    #[test]
    fn once_callback_delivers_once() {
        let results = testing::Results::default();
        let once = OnceCallback::new(Some(results.callback()));
        let native = once.as_callback();
        assert!(once.complete("error: boom".into()));
        native("42".into());
        assert!(!once.complete("late".into()));
        assert_eq!(results.values(), vec!["error: boom".to_string()]);
    }

    #[test]
    fn engine_kind_display() {
        assert_eq!(EngineKind::Chromium.to_string(), "chromium");
        assert_eq!(EngineKind::Native.to_string(), "native");
    }

    #[test]
    fn bundle_bytes() {
        let bundle = WebViewBundle(vec![1, 2, 3]);
        assert_eq!(bundle.as_bytes(), &[1, 2, 3]);
        assert!(WebViewBundle::default().is_empty());
    }
}
