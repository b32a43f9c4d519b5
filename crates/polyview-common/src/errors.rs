use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failure reported by a native engine handle.
///
/// Engine errors never escape to application code as panics: adapters log
/// them and fold them into page state or a script callback.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("native engine error: {0}")]
    Native(String),

    #[error("not supported by this engine: {0}")]
    NotSupported(String),

    #[error("no engine attached")]
    NotAttached,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Host-level failure: anything that stops a page from being shown.
#[derive(Debug, thiserror::Error)]
pub enum PolyviewError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Other(String),
}
