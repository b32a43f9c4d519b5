use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::*;
use crate::engine::{EngineKind, ScriptCallback};
use crate::jsbridge::FnHandler;
use crate::state::Headers;

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[derive(Default)]
struct FakeEngine {
    log: Log,
    saved: Option<WebViewBundle>,
    restore_fails: bool,
}

impl FakeEngine {
    fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            ..Default::default()
        }
    }
}

impl WebEngine for FakeEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Native
    }

    fn load_url(&mut self, url: &str, _headers: &Headers) -> Result<(), EngineError> {
        self.log.push(format!("load_url {url}"));
        Ok(())
    }

    fn load_html(
        &mut self,
        html: &str,
        base_url: Option<&str>,
        _mime_type: Option<&str>,
        _encoding: Option<&str>,
        _history_url: Option<&str>,
    ) -> Result<(), EngineError> {
        self.log
            .push(format!("load_html {html} base={}", base_url.unwrap_or("-")));
        Ok(())
    }

    fn post_url(&mut self, url: &str, _body: &[u8]) -> Result<(), EngineError> {
        Err(EngineError::NotSupported(format!("POST {url}")))
    }

    fn go_back(&mut self) -> Result<(), EngineError> {
        self.log.push("go_back");
        Ok(())
    }

    fn go_forward(&mut self) -> Result<(), EngineError> {
        self.log.push("go_forward");
        Ok(())
    }

    fn reload(&mut self) -> Result<(), EngineError> {
        self.log.push("reload");
        Ok(())
    }

    fn stop_loading(&mut self) -> Result<(), EngineError> {
        self.log.push("stop_loading");
        Ok(())
    }

    fn can_go_back(&self) -> bool {
        false
    }

    fn can_go_forward(&self) -> bool {
        false
    }

    fn evaluate_javascript(&mut self, script: &str, callback: Option<ScriptCallback>) {
        self.log.push(format!("eval {script}"));
        if let Some(callback) = callback {
            callback("ok".into());
        }
    }

    fn inject_js_bridge(&mut self, bridge: &WebViewJsBridge) {
        self.log.push(format!("inject {}", bridge.namespace()));
    }

    fn save_state(&mut self) -> Option<WebViewBundle> {
        self.saved.clone()
    }

    fn restore_state(&mut self, bundle: &WebViewBundle) -> Result<(), EngineError> {
        if self.restore_fails {
            return Err(EngineError::NotSupported("restore".into()));
        }
        self.log.push(format!("restore {:?}", bundle.as_bytes()));
        Ok(())
    }

    fn scroll_offset(&self) -> (i32, i32) {
        (0, 120)
    }

    fn set_bounds(&mut self, bounds: Rect) -> Result<(), EngineError> {
        self.log.push(format!("bounds {}x{}", bounds.width, bounds.height));
        Ok(())
    }

    fn dispose(&mut self) {
        self.log.push("dispose");
    }
}

fn page(content: WebContent) -> WebView<FakeEngine> {
    WebView::new(content, WebSettings::default(), WebViewNavigator::new())
}

fn pump_until(page: &mut WebView<FakeEngine>, log: &Log, prefix: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while log.count(prefix) == 0 {
        assert!(Instant::now() < deadline, "timed out waiting for {prefix}");
        page.pump();
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn buffered_commands_replay_in_order_after_content() {
    let log = Log::default();
    let mut page = page(WebContent::url("https://start.test/"));
    let navigator = page.navigator().clone();
    navigator.reload();
    navigator.evaluate_javascript("1 + 1", None);
    navigator.load_url("https://next.test/", Headers::new());
    assert_eq!(navigator.pending_len(), 3);

    page.attach(FakeEngine::new(&log)).unwrap();

    assert_eq!(
        log.entries(),
        vec![
            "load_url https://start.test/",
            "reload",
            "eval 1 + 1",
            "load_url https://next.test/",
        ]
    );
    assert!(navigator.is_attached());
    assert_eq!(navigator.pending_len(), 0);
    assert_eq!(page.drain_events(), vec![WebViewEvent::Created]);
}

#[test]
fn inline_html_content_loads_on_attach() {
    let log = Log::default();
    let mut page = page(WebContent::html("<p>hi</p>"));
    page.attach(FakeEngine::new(&log)).unwrap();
    assert_eq!(log.entries(), vec!["load_html <p>hi</p> base=-"]);
}

#[test]
fn commands_after_attach_wake_the_host() {
    let log = Log::default();
    let mut page = page(WebContent::NavigatorOnly);
    let wakes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&wakes);
    page.navigator()
        .set_command_notifier(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

    page.navigator().reload();
    assert_eq!(wakes.load(Ordering::SeqCst), 0);

    page.attach(FakeEngine::new(&log)).unwrap();
    page.navigator().go_forward();
    assert_eq!(wakes.load(Ordering::SeqCst), 1);
    assert_eq!(page.pump(), 1);
    assert_eq!(log.entries(), vec!["reload", "go_forward"]);
}

#[test]
fn script_callbacks_reach_the_caller() {
    let log = Log::default();
    let mut page = page(WebContent::NavigatorOnly);
    page.attach(FakeEngine::new(&log)).unwrap();
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    page.navigator().evaluate_javascript(
        "document.title",
        Some(Box::new(move |value| sink.lock().unwrap().push(value))),
    );
    page.pump();
    assert_eq!(*results.lock().unwrap(), vec!["ok".to_string()]);
}

#[test]
fn engine_failures_are_recorded_not_returned() {
    let log = Log::default();
    let mut page = page(WebContent::NavigatorOnly);
    page.attach(FakeEngine::new(&log)).unwrap();
    page.navigator().post_url("https://form.test/", b"a=1".to_vec());
    page.navigator().reload();
    page.pump();

    let errors = page.errors_for_current_request();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, COMMAND_FAILED);
    assert!(errors[0].description.contains("POST https://form.test/"));
    assert!(!matches!(page.loading_state(), LoadingState::ErrorLoading(_)));
    assert_eq!(log.entries(), vec!["reload"]);
}

#[test]
fn html_file_blocks_commands_behind_it() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("page.html");
    std::fs::write(&file, "<h1>file</h1>").unwrap();

    let log = Log::default();
    let mut page = page(WebContent::file(file.to_string_lossy()));
    page.navigator().reload();
    page.attach(FakeEngine::new(&log)).unwrap();

    pump_until(&mut page, &log, "reload");
    assert_eq!(
        log.entries(),
        vec!["load_html <h1>file</h1> base=-", "reload"]
    );
}

#[test]
fn html_file_resolves_through_content_provider() {
    let mut provider = ContentProvider::new(std::env::temp_dir());
    provider.add_override("app/index.html", "text/html", b"<p>bundled</p>".to_vec());

    let log = Log::default();
    let mut page = page(WebContent::file("app/index.html")).with_content_provider(Arc::new(provider));
    page.attach(FakeEngine::new(&log)).unwrap();

    pump_until(&mut page, &log, "load_html");
    assert_eq!(
        log.entries(),
        vec!["load_html <p>bundled</p> base=polyview://localhost/app/index.html"]
    );
}

#[test]
fn missing_html_file_fails_the_load() {
    let log = Log::default();
    let mut page = page(WebContent::file("/definitely/not/here.html"));
    page.attach(FakeEngine::new(&log)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while page.errors_for_current_request().is_empty() {
        assert!(Instant::now() < deadline, "timed out waiting for the read error");
        page.pump();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(matches!(page.loading_state(), LoadingState::ErrorLoading(_)));
    assert!(log.entries().is_empty());
}

#[test]
fn finished_file_read_wakes_the_host() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("page.html");
    std::fs::write(&file, "<h1>file</h1>").unwrap();

    let log = Log::default();
    let mut page = page(WebContent::file(file.to_string_lossy()));
    let wakes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&wakes);
    page.navigator()
        .set_command_notifier(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
    page.attach(FakeEngine::new(&log)).unwrap();
    assert!(log.entries().is_empty());

    let deadline = Instant::now() + Duration::from_secs(5);
    while wakes.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "reader never woke the host");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(page.pump(), 1);
    assert_eq!(log.entries(), vec!["load_html <h1>file</h1> base=-"]);
}

#[test]
fn dispose_during_file_read_requeues_the_load() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("page.html");
    std::fs::write(&file, "<h1>file</h1>").unwrap();

    let log = Log::default();
    let mut page = page(WebContent::NavigatorOnly);
    page.navigator().load_html_file(file.to_string_lossy());
    page.navigator().reload();
    page.attach(FakeEngine::new(&log)).unwrap();
    assert!(log.entries().is_empty());

    page.dispose();
    assert_eq!(page.navigator().pending_len(), 2);

    let second = Log::default();
    page.attach(FakeEngine::new(&second)).unwrap();
    pump_until(&mut page, &second, "reload");
    assert_eq!(
        second.entries(),
        vec!["load_html <h1>file</h1> base=-", "reload"]
    );
}

#[test]
fn bridge_is_injected_once_per_finished_navigation() {
    let log = Log::default();
    let navigator = WebViewNavigator::new();
    let bridge = WebViewJsBridge::new(navigator.clone());
    bridge.register_js_handler(FnHandler::new("echo", |m, _, cb| cb(m.params.clone())));
    let mut page = WebView::new(WebContent::NavigatorOnly, WebSettings::default(), navigator)
        .with_bridge(bridge.clone());
    page.attach(FakeEngine::new(&log)).unwrap();
    assert!(bridge.is_attached());

    let client = page.page_client();
    client.on_page_started(Some("https://a.test/"));
    page.pump();
    assert_eq!(log.count("inject"), 0);

    client.on_page_finished(Some("https://a.test/"), false, false);
    page.pump();
    page.pump();
    assert_eq!(log.count("inject kmpJsBridge"), 1);

    client.on_page_started(Some("https://b.test/"));
    client.on_page_finished(Some("https://b.test/"), true, false);
    page.pump();
    assert_eq!(log.count("inject"), 2);
}

#[test]
fn back_press_navigates_history_when_captured() {
    let log = Log::default();
    let mut page = page(WebContent::NavigatorOnly);
    page.attach(FakeEngine::new(&log)).unwrap();
    assert!(!page.handle_back_press());

    page.page_client().on_history_updated(true, false);
    assert!(page.handle_back_press());
    page.pump();
    assert_eq!(log.entries(), vec!["go_back"]);

    let mut settings = WebSettings::default();
    settings.capture_back_presses = false;
    let mut uncaptured: WebView<FakeEngine> =
        WebView::new(WebContent::NavigatorOnly, settings, WebViewNavigator::new());
    uncaptured.attach(FakeEngine::new(&Log::default())).unwrap();
    uncaptured.page_client().on_history_updated(true, false);
    assert!(!uncaptured.handle_back_press());
}

#[test]
fn dispose_saves_state_and_reattach_restores_it() {
    let log = Log::default();
    let mut page = page(WebContent::url("https://start.test/"));
    let mut engine = FakeEngine::new(&log);
    engine.saved = Some(WebViewBundle(vec![7, 8]));
    page.attach(engine).unwrap();
    page.drain_events();

    page.dispose();
    assert!(!page.is_attached());
    assert!(!page.navigator().is_attached());
    assert_eq!(page.drain_events(), vec![WebViewEvent::Disposed]);
    assert_eq!(
        page.state().lock().view_state(),
        Some(&WebViewBundle(vec![7, 8]))
    );
    assert_eq!(page.navigation().scroll_offset, (0, 120));

    page.navigator().reload();
    let second = Log::default();
    page.attach(FakeEngine::new(&second)).unwrap();
    assert_eq!(second.entries(), vec!["restore [7, 8]", "reload"]);
}

#[test]
fn failed_restore_falls_back_to_content() {
    let log = Log::default();
    let mut page = page(WebContent::url("https://start.test/"));
    page.state().lock().view_state = Some(WebViewBundle(vec![1]));
    let mut engine = FakeEngine::new(&log);
    engine.restore_fails = true;
    page.attach(engine).unwrap();
    assert_eq!(log.entries(), vec!["load_url https://start.test/"]);
}

#[test]
fn lifecycle_callbacks_run_once() {
    let log = Log::default();
    let created = Log::default();
    let (on_created, on_disposed) = (created.clone(), created.clone());
    let mut page = page(WebContent::NavigatorOnly)
        .on_created(move |engine: &mut FakeEngine| {
            on_created.push(format!("created {}", engine.kind()));
        })
        .on_dispose(move |_| on_disposed.push("disposed"));

    page.attach(FakeEngine::new(&log)).unwrap();
    page.dispose();
    page.dispose();
    assert_eq!(created.entries(), vec!["created native", "disposed"]);
    assert_eq!(log.entries(), vec!["dispose"]);
}

#[test]
fn one_engine_per_page() {
    let log = Log::default();
    let mut page = page(WebContent::NavigatorOnly);
    page.attach(FakeEngine::new(&log)).unwrap();
    assert!(matches!(
        page.attach(FakeEngine::new(&log)),
        Err(EngineError::NotSupported(_))
    ));
}

#[test]
fn bounds_need_an_engine() {
    let log = Log::default();
    let mut page = page(WebContent::NavigatorOnly);
    assert!(matches!(
        page.set_bounds(Rect::new(0.0, 0.0, 10.0, 10.0)),
        Err(EngineError::NotAttached)
    ));
    page.attach(FakeEngine::new(&log)).unwrap();
    page.set_bounds(Rect::new(0.0, 0.0, 800.0, 600.0)).unwrap();
    assert_eq!(log.entries(), vec!["bounds 800x600"]);
}
