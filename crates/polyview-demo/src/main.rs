mod app;
mod cli;

use std::path::Path;

use tracing_subscriber::EnvFilter;
use winit::event_loop::EventLoop;

use polyview::WebContent;
use polyview_common::PolyviewError;
use polyview_config::PolyviewConfig;

fn main() {
    let args = cli::parse();

    let log_directive = args.log_level.as_deref().unwrap_or("polyview=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "polyview=info".parse().unwrap()),
            ),
        )
        .init();

    tracing::info!("polyview demo v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        tracing::error!("polyview demo failed: {e}");
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}

fn run(args: &cli::Args) -> polyview_common::Result<()> {
    let config = load_config(args)?;
    tracing::debug!("Config: {}", polyview_config::config_to_json(&config));

    let content = match &args.url {
        Some(url) => WebContent::url(url.clone()),
        None if args.assets.is_some() => WebContent::url("polyview://localhost/index.html"),
        None => WebContent::html(app::demo_page(&config.bridge.namespace)),
    };

    let event_loop = EventLoop::<app::Wake>::with_user_event()
        .build()
        .map_err(|e| PolyviewError::Other(format!("failed to create event loop: {e}")))?;
    let mut app = app::DemoApp::new(config, content, args, event_loop.create_proxy());

    tracing::info!("Entering event loop");
    event_loop
        .run_app(&mut app)
        .map_err(|e| PolyviewError::Other(format!("event loop error: {e}")))
}

/// An explicit `--config` must load; the platform default falls back to
/// built-in settings.
fn load_config(args: &cli::Args) -> polyview_common::Result<PolyviewConfig> {
    match &args.config {
        Some(path) => {
            tracing::info!("Using config override: {path}");
            Ok(polyview_config::load_config_from(Path::new(path))?)
        }
        None => Ok(polyview_config::load_config().unwrap_or_else(|e| {
            tracing::warn!("Config load failed, using defaults: {e}");
            PolyviewConfig::default()
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use polyview_common::ConfigError;

    #[test]
    fn explicit_config_errors_propagate() {
        let args = cli::Args::try_parse_from([
            "polyview-demo",
            "--config",
            "/definitely/not/polyview.toml",
        ])
        .unwrap();
        let err = load_config(&args).unwrap_err();
        assert!(matches!(
            err,
            PolyviewError::Config(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.toml");
        std::fs::write(&path, "[bridge]\nnamespace = \"demoBridge\"\n").unwrap();
        let args = cli::Args::try_parse_from([
            "polyview-demo",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(load_config(&args).unwrap().bridge.namespace, "demoBridge");
    }
}
