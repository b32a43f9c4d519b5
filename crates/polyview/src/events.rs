//! Page event types.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::state::{LoadingState, WebViewError};

/// Outcome of a navigation decision as reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationDecision {
    /// The engine proceeds with the navigation.
    Proceed,
    /// The engine drops the navigation.
    Cancel,
    /// The engine drops it and a rewritten request was queued instead.
    Rewritten,
}

impl NavigationDecision {
    /// Whether the native engine should carry on with its own navigation.
    pub fn allows(&self) -> bool {
        matches!(self, NavigationDecision::Proceed)
    }
}

/// Events emitted by a page.
#[derive(Debug, Clone, PartialEq)]
pub enum WebViewEvent {
    /// The native engine handle became available.
    Created,
    /// Loading state changed for the given URL.
    LoadingStateChanged {
        state: LoadingState,
        url: Option<String>,
    },
    /// Document title changed.
    TitleChanged { title: String },
    /// Back/forward availability changed.
    HistoryChanged {
        can_go_back: bool,
        can_go_forward: bool,
    },
    /// The engine reported an error for the current request.
    ErrorReceived { error: WebViewError },
    /// A navigation decision was taken.
    NavigationRequested {
        url: String,
        decision: NavigationDecision,
    },
    /// The page wrote to its console.
    ConsoleMessage { message: String },
    /// A bridge envelope arrived from script.
    BridgeMessage {
        method_name: String,
        callback_id: i32,
    },
    /// The native engine handle is about to be destroyed.
    Disposed,
}

/// Event sink shared between a page and its engine callbacks. The host
/// drains it from its main loop.
#[derive(Debug, Clone, Default)]
pub struct EventQueue(Arc<Mutex<Vec<WebViewEvent>>>);

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: WebViewEvent) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }

    /// Drain all pending events.
    pub fn drain(&self) -> Vec<WebViewEvent> {
        match self.0.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
