use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Identity of one page instance, used to correlate log lines and events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewId(String);

impl ViewId {
    pub fn new() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex digits, enough to tell views apart in logs.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl Default for ViewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
