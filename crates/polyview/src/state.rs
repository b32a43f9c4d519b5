//! Page lifecycle state.
//!
//! One `WebViewState` exists per page. Engine adapters are the only
//! writers; everything else reads snapshots.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::engine::WebViewBundle;

/// HTTP headers attached to a request, kept in a stable order.
pub type Headers = BTreeMap<String, String>;

/// Loading phase of the current navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum LoadingState {
    /// No navigation has started yet.
    #[default]
    Initializing,
    /// Navigation in flight; progress is within `[0.0, 1.0]`.
    Loading(f32),
    /// Navigation completed.
    Finished,
    /// Navigation failed as a whole.
    ErrorLoading(String),
}

impl LoadingState {
    /// A `Loading` state with `progress` clamped into `[0.0, 1.0]`.
    pub fn loading(progress: f32) -> Self {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        LoadingState::Loading(progress)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadingState::Loading(_))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, LoadingState::Finished)
    }

    /// Finished and failed navigations only change when a new one starts.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadingState::Finished | LoadingState::ErrorLoading(_))
    }

    pub fn progress(&self) -> f32 {
        match self {
            LoadingState::Initializing => 0.0,
            LoadingState::Loading(p) => *p,
            LoadingState::Finished | LoadingState::ErrorLoading(_) => 1.0,
        }
    }
}

/// An error reported by the engine while loading the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebViewError {
    pub code: i32,
    pub description: String,
}

impl WebViewError {
    pub fn new(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }
}

/// History and presentation facts about the current page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NavigationState {
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub last_loaded_url: Option<String>,
    pub page_title: Option<String>,
    pub scroll_offset: (i32, i32),
}

/// What a page was asked to show when it was created.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WebContent {
    Url {
        url: String,
        additional_http_headers: Headers,
    },
    Data {
        data: String,
        base_url: Option<String>,
        encoding: String,
        mime_type: Option<String>,
        history_url: Option<String>,
    },
    /// A bundled HTML file, resolved relative to the page's asset root.
    File { file_name: String },
    Post { url: String, post_data: Vec<u8> },
    /// Content is driven entirely through the navigator.
    #[default]
    NavigatorOnly,
}

impl WebContent {
    pub fn url(url: impl Into<String>) -> Self {
        WebContent::Url {
            url: url.into(),
            additional_http_headers: Headers::new(),
        }
    }

    pub fn html(data: impl Into<String>) -> Self {
        WebContent::Data {
            data: data.into(),
            base_url: None,
            encoding: "utf-8".to_string(),
            mime_type: None,
            history_url: None,
        }
    }

    pub fn file(file_name: impl Into<String>) -> Self {
        WebContent::File {
            file_name: file_name.into(),
        }
    }

    /// The URL this content resolves to, when it has one.
    pub fn current_url(&self) -> Option<&str> {
        match self {
            WebContent::Url { url, .. } | WebContent::Post { url, .. } => Some(url),
            WebContent::Data { base_url, .. } => base_url.as_deref(),
            WebContent::File { .. } | WebContent::NavigatorOnly => None,
        }
    }
}

/// Full state of one page.
#[derive(Debug, Default)]
pub struct WebViewState {
    pub(crate) content: WebContent,
    pub(crate) loading_state: LoadingState,
    pub(crate) navigation: NavigationState,
    pub(crate) errors_for_current_request: Vec<WebViewError>,
    /// Bumped every time a top-level navigation starts.
    pub(crate) navigation_id: u64,
    /// URL of the last progress update, used to ignore echoes after finish.
    progress_url: Option<String>,
    pub(crate) view_state: Option<WebViewBundle>,
}

impl WebViewState {
    pub fn new(content: WebContent) -> Self {
        Self {
            content,
            ..Default::default()
        }
    }

    pub fn content(&self) -> &WebContent {
        &self.content
    }

    pub fn loading_state(&self) -> &LoadingState {
        &self.loading_state
    }

    pub fn is_loading(&self) -> bool {
        self.loading_state.is_loading()
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    pub fn last_loaded_url(&self) -> Option<&str> {
        self.navigation.last_loaded_url.as_deref()
    }

    pub fn page_title(&self) -> Option<&str> {
        self.navigation.page_title.as_deref()
    }

    pub fn errors_for_current_request(&self) -> &[WebViewError] {
        &self.errors_for_current_request
    }

    pub fn navigation_id(&self) -> u64 {
        self.navigation_id
    }

    /// The last saved engine state, if any.
    pub fn view_state(&self) -> Option<&WebViewBundle> {
        self.view_state.as_ref()
    }

    // -- Transitions (engine callbacks only) --

    /// A new top-level navigation started.
    pub(crate) fn begin_navigation(&mut self, url: Option<&str>) {
        self.navigation_id += 1;
        self.loading_state = LoadingState::loading(0.0);
        self.errors_for_current_request.clear();
        self.navigation.page_title = None;
        self.progress_url = url.map(str::to_string);
        if let Some(url) = url {
            self.navigation.last_loaded_url = Some(url.to_string());
        }
    }

    /// Apply a progress report. Returns whether the state changed.
    ///
    /// A report of `1.0` or more finishes the navigation. Reports that
    /// arrive after `Finished` for the same URL are ignored, and progress
    /// never moves backwards within a navigation.
    pub(crate) fn update_progress(&mut self, progress: f32, url: Option<&str>) -> bool {
        let mut changed = false;
        if self.loading_state.is_terminal() {
            if url.is_none() || url == self.progress_url.as_deref() {
                return false;
            }
            // Progress for a URL we never saw start: treat it as a new load.
            self.begin_navigation(url);
            changed = true;
        }

        let next = if progress >= 1.0 {
            LoadingState::Finished
        } else {
            LoadingState::loading(progress.max(self.loading_state.progress()))
        };
        if next != self.loading_state {
            self.loading_state = next;
            changed = true;
        }
        if url.is_some() {
            self.progress_url = url.map(str::to_string);
        }
        changed
    }

    /// The navigation finished. Returns whether the state changed; a second
    /// finish for the same URL is a no-op.
    pub(crate) fn finish(&mut self, url: Option<&str>) -> bool {
        let same_url = url.is_none() || url == self.navigation.last_loaded_url.as_deref();
        if self.loading_state.is_finished() && same_url {
            return false;
        }
        if matches!(self.loading_state, LoadingState::ErrorLoading(_)) && same_url {
            return false;
        }
        self.loading_state = LoadingState::Finished;
        if let Some(url) = url {
            self.navigation.last_loaded_url = Some(url.to_string());
            self.progress_url = Some(url.to_string());
        }
        true
    }

    /// Record an engine error. `fatal` carries the message when the whole
    /// navigation failed.
    pub(crate) fn record_error(&mut self, error: WebViewError, fatal: Option<String>) {
        self.errors_for_current_request.push(error);
        if let Some(message) = fatal {
            if !self.loading_state.is_finished() {
                self.loading_state = LoadingState::ErrorLoading(message);
            }
        }
    }

    pub(crate) fn set_title(&mut self, title: Option<String>) {
        self.navigation.page_title = title;
    }

    pub(crate) fn set_last_loaded_url(&mut self, url: &str) {
        self.navigation.last_loaded_url = Some(url.to_string());
    }

    /// Returns whether either flag changed.
    pub(crate) fn set_history(&mut self, can_go_back: bool, can_go_forward: bool) -> bool {
        let changed = self.navigation.can_go_back != can_go_back
            || self.navigation.can_go_forward != can_go_forward;
        self.navigation.can_go_back = can_go_back;
        self.navigation.can_go_forward = can_go_forward;
        changed
    }

    pub(crate) fn set_scroll_offset(&mut self, offset: (i32, i32)) {
        self.navigation.scroll_offset = offset;
    }
}

/// Handle to a page's state shared between the page and its engine.
#[derive(Debug, Clone, Default)]
pub struct SharedState(Arc<Mutex<WebViewState>>);

impl SharedState {
    pub fn new(state: WebViewState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Lock the state. A poisoned lock still yields the data: state is
    /// plain values and stays readable after a panicking writer.
    pub fn lock(&self) -> MutexGuard<'_, WebViewState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn loading_state(&self) -> LoadingState {
        self.lock().loading_state.clone()
    }

    pub fn navigation(&self) -> NavigationState {
        self.lock().navigation.clone()
    }

    pub fn errors_for_current_request(&self) -> Vec<WebViewError> {
        self.lock().errors_for_current_request.clone()
    }
}
