pub mod errors;
pub mod id;
pub mod types;

pub use errors::{ConfigError, EngineError, PolyviewError};
pub use id::{new_id, ViewId};
pub use types::Rect;

pub type Result<T> = std::result::Result<T, PolyviewError>;
