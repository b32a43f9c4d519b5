use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use polyview_config::UnhandledMethod;
use tracing::{debug, warn};

use super::handler::{CallMode, HandlerRegistration, JsMessageHandler, ResultCallback};
use super::message::JsMessage;
use super::BridgeError;
use crate::navigator::WebViewNavigator;

/// What to do with a call naming no registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhandledMethodPolicy {
    /// Drop the call with a debug log.
    #[default]
    Ignore,
    /// Return [`BridgeError::HandlerNotFound`] and log a warning.
    Report,
}

impl From<UnhandledMethod> for UnhandledMethodPolicy {
    fn from(value: UnhandledMethod) -> Self {
        match value {
            UnhandledMethod::Ignore => UnhandledMethodPolicy::Ignore,
            UnhandledMethod::Report => UnhandledMethodPolicy::Report,
        }
    }
}

/// Routes script calls to registered handlers, one handler per method name.
#[derive(Default)]
pub struct JsMessageDispatcher {
    handlers: Mutex<HashMap<String, Arc<dyn JsMessageHandler>>>,
    policy: UnhandledMethodPolicy,
}

impl JsMessageDispatcher {
    pub fn new(policy: UnhandledMethodPolicy) -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            policy,
        }
    }

    fn handlers(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn JsMessageHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self) -> UnhandledMethodPolicy {
        self.policy
    }

    /// Register `handler`, silently replacing any handler with the same
    /// method name.
    pub fn register_js_handler(&self, handler: Arc<dyn JsMessageHandler>) {
        let name = handler.method_name().to_string();
        if self.handlers().insert(name.clone(), handler).is_some() {
            debug!(method = %name, "bridge handler replaced");
        } else {
            debug!(method = %name, "bridge handler registered");
        }
    }

    /// Remove the handler for `method_name`. Returns whether one existed.
    pub fn unregister_js_handler(&self, method_name: &str) -> bool {
        self.handlers().remove(method_name).is_some()
    }

    pub fn can_handle(&self, method_name: &str) -> bool {
        self.handlers().contains_key(method_name)
    }

    pub fn clear(&self) {
        self.handlers().clear();
    }

    pub fn len(&self) -> usize {
        self.handlers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn registration(&self, method_name: &str) -> Option<HandlerRegistration> {
        self.handlers().get(method_name).map(|h| h.registration())
    }

    /// All registrations, sorted by method name.
    pub fn registrations(&self) -> Vec<HandlerRegistration> {
        let mut registrations: Vec<_> = self.handlers().values().map(|h| h.registration()).collect();
        registrations.sort_by(|a, b| a.method_name.cmp(&b.method_name));
        registrations
    }

    /// Hand `message` to its handler. The handler runs without the
    /// registry lock held, so it may register or unregister handlers.
    pub fn dispatch(
        &self,
        message: &JsMessage,
        navigator: Option<&WebViewNavigator>,
        callback: ResultCallback,
    ) -> Result<(), BridgeError> {
        let handler = self.handlers().get(&message.method_name).cloned();
        let Some(handler) = handler else {
            return match self.policy {
                UnhandledMethodPolicy::Ignore => {
                    debug!(method = %message.method_name, "no bridge handler; call dropped");
                    Ok(())
                }
                UnhandledMethodPolicy::Report => {
                    warn!(method = %message.method_name, "no bridge handler registered");
                    Err(BridgeError::HandlerNotFound(message.method_name.clone()))
                }
            };
        };

        if handler.call_mode() != CallMode::SyncCallback {
            handler.handle(message, navigator, callback);
            return Ok(());
        }

        let answered = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&answered);
        handler.handle(
            message,
            navigator,
            Box::new(move |result| {
                flag.store(true, Ordering::SeqCst);
                callback(result);
            }),
        );
        if !answered.load(Ordering::SeqCst) {
            warn!(method = %message.method_name, "sync bridge handler returned without a result");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsbridge::FnHandler;

    fn collect() -> (Arc<Mutex<Vec<String>>>, ResultCallback) {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        (results, Box::new(move |r| sink.lock().unwrap().push(r)))
    }

    #[test]
    fn dispatches_to_registered_handler() {
        let dispatcher = JsMessageDispatcher::default();
        dispatcher.register_js_handler(Arc::new(FnHandler::new("echo", |m, _, cb| {
            cb(m.params.clone())
        })));
        let (results, callback) = collect();
        dispatcher
            .dispatch(&JsMessage::new(1, "echo", "\"hi\""), None, callback)
            .unwrap();
        assert_eq!(*results.lock().unwrap(), vec!["\"hi\"".to_string()]);
    }

    #[test]
    fn last_registration_wins() {
        let dispatcher = JsMessageDispatcher::default();
        dispatcher.register_js_handler(Arc::new(FnHandler::new("v", |_, _, cb| cb("1".into()))));
        dispatcher.register_js_handler(Arc::new(
            FnHandler::new("v", |_, _, cb| cb("2".into())).with_params(0, 2),
        ));
        assert_eq!(dispatcher.len(), 1);
        assert_eq!(dispatcher.registration("v").unwrap().max_param_count, 2);

        let (results, callback) = collect();
        dispatcher.dispatch(&JsMessage::new(1, "v", ""), None, callback).unwrap();
        assert_eq!(*results.lock().unwrap(), vec!["2".to_string()]);
    }

    #[test]
    fn unregister_and_clear() {
        let dispatcher = JsMessageDispatcher::default();
        dispatcher.register_js_handler(Arc::new(FnHandler::new("a", |_, _, _| {})));
        dispatcher.register_js_handler(Arc::new(FnHandler::new("b", |_, _, _| {})));
        assert!(dispatcher.unregister_js_handler("a"));
        assert!(!dispatcher.unregister_js_handler("a"));
        assert!(!dispatcher.can_handle("a"));
        assert!(dispatcher.can_handle("b"));
        dispatcher.clear();
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn unknown_method_ignored_by_default() {
        let dispatcher = JsMessageDispatcher::default();
        let (results, callback) = collect();
        assert!(dispatcher
            .dispatch(&JsMessage::new(1, "missing", ""), None, callback)
            .is_ok());
        assert!(results.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_method_reported_when_configured() {
        let dispatcher = JsMessageDispatcher::new(UnhandledMethodPolicy::Report);
        let (_, callback) = collect();
        let err = dispatcher
            .dispatch(&JsMessage::new(1, "missing", ""), None, callback)
            .unwrap_err();
        assert!(matches!(err, BridgeError::HandlerNotFound(name) if name == "missing"));
    }

    #[test]
    fn registrations_are_sorted() {
        let dispatcher = JsMessageDispatcher::default();
        for name in ["zeta", "alpha", "mid"] {
            dispatcher.register_js_handler(Arc::new(FnHandler::new(name, |_, _, _| {})));
        }
        let names: Vec<_> = dispatcher
            .registrations()
            .into_iter()
            .map(|r| r.method_name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn handlers_may_reenter_the_dispatcher() {
        let dispatcher = Arc::new(JsMessageDispatcher::default());
        let inner = Arc::clone(&dispatcher);
        dispatcher.register_js_handler(Arc::new(FnHandler::new("install", move |_, _, cb| {
            inner.register_js_handler(Arc::new(FnHandler::new("late", |_, _, _| {})));
            cb("ok".into());
        })));
        let (_, callback) = collect();
        dispatcher
            .dispatch(&JsMessage::new(1, "install", ""), None, callback)
            .unwrap();
        assert!(dispatcher.can_handle("late"));
    }

    #[test]
    fn config_policy_maps() {
        assert_eq!(
            UnhandledMethodPolicy::from(UnhandledMethod::Report),
            UnhandledMethodPolicy::Report
        );
        assert_eq!(
            UnhandledMethodPolicy::from(UnhandledMethod::Ignore),
            UnhandledMethodPolicy::Ignore
        );
    }
}
