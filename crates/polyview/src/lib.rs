//! Embeddable web pages over interchangeable native browser engines.
//!
//! Provides:
//! - Page lifecycle state (loading progress, history, errors)
//! - A buffered command navigator
//! - Request interception with rewrite support
//! - A script-to-native RPC bridge over per-engine transports
//! - Engine bindings for mobile, embedded Chromium and native OS engines
//! - Custom protocol for serving bundled content

pub mod content;
pub mod engine;
pub mod events;
pub mod jsbridge;
pub mod navigator;
pub mod request;
pub mod security;
pub mod settings;
pub mod state;
pub mod webview;

pub use content::ContentProvider;
pub use engine::client::PageClient;
pub use engine::{EngineKind, WebEngine, WebViewBundle};
pub use events::{NavigationDecision, WebViewEvent};
pub use jsbridge::{BridgeError, FnHandler, JsMessage, JsMessageHandler, WebViewJsBridge};
pub use navigator::{NavigationCommand, WebViewNavigator};
pub use request::{RequestInterceptor, WebRequest, WebRequestInterceptResult};
pub use settings::WebSettings;
pub use state::{LoadingState, NavigationState, WebContent, WebViewError, WebViewState};
pub use webview::WebView;
