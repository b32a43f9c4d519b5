use serde::{Deserialize, Serialize};

/// `callback_id` of a message that expects no result.
pub const NO_CALLBACK: i32 = 0;

/// Envelope for a script-to-native call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsMessage {
    /// Id the result is delivered back under; [`NO_CALLBACK`] for none.
    #[serde(default)]
    pub callback_id: i32,
    pub method_name: String,
    /// JSON-encoded parameters, passed to the handler untouched.
    #[serde(default)]
    pub params: String,
}

impl JsMessage {
    pub fn new(callback_id: i32, method_name: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            callback_id,
            method_name: method_name.into(),
            params: params.into(),
        }
    }

    pub fn expects_result(&self) -> bool {
        self.callback_id != NO_CALLBACK
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
