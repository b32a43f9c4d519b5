use std::fmt;

use serde::{Deserialize, Serialize};

use super::message::JsMessage;
use crate::navigator::WebViewNavigator;

/// Delivers a handler's result back to the calling script.
pub type ResultCallback = Box<dyn FnOnce(String) + Send>;

/// How a script stub waits for its native handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CallMode {
    /// The stub returns nothing and no result is delivered.
    FireAndForget,
    /// The stub returns a promise; the handler answers before returning.
    SyncCallback,
    /// The stub returns a promise; the handler answers whenever it likes.
    #[default]
    AsyncCallback,
}

impl CallMode {
    pub fn expects_result(&self) -> bool {
        !matches!(self, CallMode::FireAndForget)
    }
}

/// Registration facts the script generator needs about a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerRegistration {
    pub method_name: String,
    pub min_param_count: usize,
    pub max_param_count: usize,
    pub call_mode: CallMode,
}

impl HandlerRegistration {
    pub fn accepts(&self, count: usize) -> bool {
        (self.min_param_count..=self.max_param_count).contains(&count)
    }
}

/// A native method callable from script.
pub trait JsMessageHandler: Send + Sync {
    /// Unique method name; registering a second handler with the same name
    /// replaces the first.
    fn method_name(&self) -> &str;

    fn min_param_count(&self) -> usize {
        1
    }

    fn max_param_count(&self) -> usize {
        1
    }

    fn call_mode(&self) -> CallMode {
        CallMode::AsyncCallback
    }

    /// Handle one call. `callback` must be invoked at most once; a handler
    /// that never invokes it leaves the script promise pending.
    fn handle(&self, message: &JsMessage, navigator: Option<&WebViewNavigator>, callback: ResultCallback);

    fn registration(&self) -> HandlerRegistration {
        HandlerRegistration {
            method_name: self.method_name().to_string(),
            min_param_count: self.min_param_count(),
            max_param_count: self.max_param_count().max(self.min_param_count()),
            call_mode: self.call_mode(),
        }
    }
}

type HandleFn = dyn Fn(&JsMessage, Option<&WebViewNavigator>, ResultCallback) + Send + Sync;

/// Closure-backed handler.
pub struct FnHandler {
    registration: HandlerRegistration,
    handle: Box<HandleFn>,
}

impl FnHandler {
    /// A one-argument async handler.
    pub fn new<F>(method_name: impl Into<String>, handle: F) -> Self
    where
        F: Fn(&JsMessage, Option<&WebViewNavigator>, ResultCallback) + Send + Sync + 'static,
    {
        Self {
            registration: HandlerRegistration {
                method_name: method_name.into(),
                min_param_count: 1,
                max_param_count: 1,
                call_mode: CallMode::AsyncCallback,
            },
            handle: Box::new(handle),
        }
    }

    pub fn with_params(mut self, min: usize, max: usize) -> Self {
        self.registration.min_param_count = min;
        self.registration.max_param_count = max.max(min);
        self
    }

    pub fn with_mode(mut self, mode: CallMode) -> Self {
        self.registration.call_mode = mode;
        self
    }
}

impl fmt::Debug for FnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("registration", &self.registration)
            .finish()
    }
}

impl JsMessageHandler for FnHandler {
    fn method_name(&self) -> &str {
        &self.registration.method_name
    }

    fn min_param_count(&self) -> usize {
        self.registration.min_param_count
    }

    fn max_param_count(&self) -> usize {
        self.registration.max_param_count
    }

    fn call_mode(&self) -> CallMode {
        self.registration.call_mode
    }

    fn handle(&self, message: &JsMessage, navigator: Option<&WebViewNavigator>, callback: ResultCallback) {
        (self.handle)(message, navigator, callback)
    }
}
