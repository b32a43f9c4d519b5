//! `ApplicationHandler` hosting one polyview page in a winit window.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowAttributes, WindowId};

use polyview::engine::native::{NativeDelegate, NativeEngine};
use polyview::engine::wry_view::WryView;
use polyview::request::PrefixAllowList;
use polyview::{
    ContentProvider, FnHandler, WebContent, WebSettings, WebView, WebViewEvent, WebViewJsBridge,
    WebViewNavigator,
};
use polyview_common::{PolyviewError, Rect};
use polyview_config::PolyviewConfig;

use crate::cli::Args;

/// How often the page is pumped while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Sent by the navigator when a command is queued.
#[derive(Debug, Clone, Copy)]
pub struct Wake;

type DemoPage = WebView<NativeEngine<WryView>>;

pub struct DemoApp {
    config: PolyviewConfig,
    content: Option<WebContent>,
    assets: Option<Arc<ContentProvider>>,
    allow: Vec<String>,
    proxy: EventLoopProxy<Wake>,
    window: Option<Arc<Window>>,
    page: Option<DemoPage>,
}

impl DemoApp {
    pub fn new(
        config: PolyviewConfig,
        content: WebContent,
        args: &Args,
        proxy: EventLoopProxy<Wake>,
    ) -> Self {
        let assets = args
            .assets
            .as_ref()
            .map(|dir| Arc::new(ContentProvider::new(PathBuf::from(dir))));
        Self {
            config,
            content: Some(content),
            assets,
            allow: args.allow.clone(),
            proxy,
            window: None,
            page: None,
        }
    }

    fn window_rect(window: &Window) -> Rect {
        let size = window.inner_size().to_logical::<f64>(window.scale_factor());
        Rect::new(0.0, 0.0, size.width, size.height)
    }

    /// Create the window and mount the page.
    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> polyview_common::Result<()> {
        let attrs = WindowAttributes::default()
            .with_title("polyview")
            .with_inner_size(winit::dpi::LogicalSize::new(1024.0, 720.0));
        let window = event_loop
            .create_window(attrs)
            .map(Arc::new)
            .map_err(|e| PolyviewError::Other(format!("failed to create window: {e}")))?;

        let settings = WebSettings::from_config(&self.config);
        let navigator = WebViewNavigator::new();
        if !self.allow.is_empty() {
            navigator.set_request_interceptor(Some(Arc::new(PrefixAllowList::new(
                self.allow.iter().cloned(),
            ))));
        }

        let bridge = WebViewJsBridge::from_config(navigator.clone(), &self.config.bridge);
        bridge.register_js_handler(FnHandler::new("echo", |message, _, callback| {
            tracing::info!("echo: {}", message.params);
            callback(message.params.clone());
        }));

        let content = self.content.take().unwrap_or_default();
        let mut page = WebView::new(content, settings.clone(), navigator.clone()).with_bridge(bridge);
        if let Some(assets) = &self.assets {
            page = page.with_content_provider(Arc::clone(assets));
        }

        let delegate = NativeDelegate::new(page.page_client());
        let view = WryView::build(
            window.as_ref(),
            Self::window_rect(&window),
            &settings,
            delegate.clone(),
            self.assets.clone(),
        )?;

        let proxy = self.proxy.clone();
        navigator.set_command_notifier(Some(Arc::new(move || {
            let _ = proxy.send_event(Wake);
        })));

        page.attach(NativeEngine::with_delegate(view, delegate))?;

        self.window = Some(window);
        self.page = Some(page);
        Ok(())
    }

    fn pump(&mut self) {
        let Some(page) = self.page.as_mut() else {
            return;
        };
        page.pump();
        for event in page.drain_events() {
            match event {
                WebViewEvent::TitleChanged { title } => {
                    if let Some(window) = &self.window {
                        window.set_title(&format!("polyview - {title}"));
                    }
                }
                WebViewEvent::ErrorReceived { error } => {
                    tracing::warn!(code = error.code, "page error: {}", error.description);
                }
                other => tracing::debug!(event = ?other, "page event"),
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut page) = self.page.take() {
            page.dispose();
        }
    }
}

impl ApplicationHandler<Wake> for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.initialize(event_loop) {
            tracing::error!("Failed to start the page: {e}");
            event_loop.exit();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, _event: Wake) {
        self.pump();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Window close requested");
                self.shutdown();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return;
                }
                if let (Some(window), Some(page)) = (&self.window, self.page.as_mut()) {
                    if let Err(e) = page.set_bounds(Self::window_rect(window)) {
                        tracing::warn!("Failed to resize web view: {e}");
                    }
                }
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::BrowserBack | NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                let consumed = self.page.as_ref().is_some_and(|page| page.handle_back_press());
                if !consumed {
                    tracing::debug!("back press not consumed");
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.pump();
        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + POLL_INTERVAL));
    }
}

/// Built-in page exercising the `echo` handler under `namespace`.
pub fn demo_page(namespace: &str) -> String {
    DEMO_PAGE.replace("__NAMESPACE__", namespace)
}

const DEMO_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>polyview demo</title></head>
<body style="font-family: sans-serif">
  <h1>polyview</h1>
  <input id="text" value="hello from the page">
  <button id="send">echo</button>
  <pre id="out"></pre>
  <script>
    document.getElementById("send").onclick = function () {
      var bridge = window.__NAMESPACE__;
      if (!bridge || !bridge.echo) {
        document.getElementById("out").textContent = "bridge not ready";
        return;
      }
      bridge.echo(document.getElementById("text").value).then(function (result) {
        document.getElementById("out").textContent = "native said: " + result;
      });
    };
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_page_uses_the_namespace() {
        let page = demo_page("myBridge");
        assert!(page.contains("window.myBridge;"));
        assert!(!page.contains("__NAMESPACE__"));
    }
}
