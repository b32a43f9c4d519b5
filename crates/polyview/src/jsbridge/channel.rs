//! Transports carrying [`JsMessage`] envelopes from script to native.
//!
//! All three engines share the envelope; only its encoding on the wire
//! differs. Each channel contributes the `window.<ns>.postMessage` shim the
//! bootstrap script posts through.

use super::message::JsMessage;
use super::BridgeError;

/// One engine's script-to-native transport.
pub trait MessageChannel: Send + Sync {
    /// Short name for logs.
    fn transport(&self) -> &'static str;

    /// Script defining `window.<namespace>.postMessage(message)`, where
    /// `message` is the JSON envelope text.
    fn install_script(&self, namespace: &str) -> String;

    /// Recover the envelope from what the engine delivered.
    fn decode(&self, raw: &str) -> Result<JsMessage, BridgeError>;

    /// Wire form of `message`, as the engine would deliver it.
    fn encode(&self, message: &JsMessage) -> Result<String, BridgeError>;
}

fn parse_envelope(json: &str) -> Result<JsMessage, BridgeError> {
    JsMessage::from_json(json).map_err(|e| BridgeError::MalformedEnvelope(e.to_string()))
}

/// A named object injected into the page whose `call` method receives the
/// envelope text.
#[derive(Debug, Clone)]
pub struct JsInterfaceChannel {
    object_name: String,
}

impl JsInterfaceChannel {
    pub const DEFAULT_OBJECT_NAME: &'static str = "androidJsBridge";

    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
        }
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }
}

impl Default for JsInterfaceChannel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_OBJECT_NAME)
    }
}

impl MessageChannel for JsInterfaceChannel {
    fn transport(&self) -> &'static str {
        "js-interface"
    }

    fn install_script(&self, namespace: &str) -> String {
        format!(
            "window.{namespace}.postMessage = function (message) {{\n  window.{object}.call(message);\n}};\n",
            object = self.object_name
        )
    }

    fn decode(&self, raw: &str) -> Result<JsMessage, BridgeError> {
        parse_envelope(raw)
    }

    fn encode(&self, message: &JsMessage) -> Result<String, BridgeError> {
        Ok(message.to_json())
    }
}

/// Envelopes travel as navigations to `<scheme>://call?message=<encoded>`
/// from a throwaway iframe; the engine's navigation hook swallows them.
#[derive(Debug, Clone)]
pub struct CustomSchemeChannel {
    scheme: String,
}

impl CustomSchemeChannel {
    pub const DEFAULT_SCHEME: &'static str = "kmpbridge";

    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    fn prefix(&self) -> String {
        format!("{}://call?message=", self.scheme)
    }

    pub fn is_bridge_url(&self, url: &str) -> bool {
        url.split_once(':')
            .is_some_and(|(scheme, _)| scheme.eq_ignore_ascii_case(&self.scheme))
    }
}

impl Default for CustomSchemeChannel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SCHEME)
    }
}

impl MessageChannel for CustomSchemeChannel {
    fn transport(&self) -> &'static str {
        "custom-scheme"
    }

    fn install_script(&self, namespace: &str) -> String {
        format!(
            r#"window.{namespace}.postMessage = function (message) {{
  var frame = document.createElement("iframe");
  frame.style.display = "none";
  frame.src = "{prefix}" + encodeURIComponent(message);
  document.documentElement.appendChild(frame);
  setTimeout(function () {{ frame.remove(); }}, 0);
}};
"#,
            prefix = self.prefix()
        )
    }

    fn decode(&self, raw: &str) -> Result<JsMessage, BridgeError> {
        if !self.is_bridge_url(raw) {
            return Err(BridgeError::MalformedEnvelope(format!(
                "not a {} url",
                self.scheme
            )));
        }
        let query = raw
            .split_once('?')
            .map(|(_, q)| q)
            .unwrap_or_default();
        let encoded = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("message="))
            .ok_or_else(|| BridgeError::MalformedEnvelope("missing message parameter".into()))?;
        let json = urlencoding::decode(encoded)
            .map_err(|e| BridgeError::MalformedEnvelope(e.to_string()))?;
        parse_envelope(&json)
    }

    fn encode(&self, message: &JsMessage) -> Result<String, BridgeError> {
        Ok(format!(
            "{}{}",
            self.prefix(),
            urlencoding::encode(&message.to_json())
        ))
    }
}

/// A named script message handler reached through `<target>.postMessage`.
#[derive(Debug, Clone)]
pub struct MessageHandlerChannel {
    handler_name: String,
    target: String,
}

impl MessageHandlerChannel {
    /// `target` is the script expression owning `postMessage`, e.g.
    /// `window.webkit.messageHandlers.<handler_name>`.
    pub fn new(handler_name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            handler_name: handler_name.into(),
            target: target.into(),
        }
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl MessageChannel for MessageHandlerChannel {
    fn transport(&self) -> &'static str {
        "message-handler"
    }

    fn install_script(&self, namespace: &str) -> String {
        format!(
            "window.{namespace}.postMessage = function (message) {{\n  {target}.postMessage(message);\n}};\n",
            target = self.target
        )
    }

    fn decode(&self, raw: &str) -> Result<JsMessage, BridgeError> {
        parse_envelope(raw)
    }

    fn encode(&self, message: &JsMessage) -> Result<String, BridgeError> {
        Ok(message.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> JsMessage {
        JsMessage::new(5, "save", "{\"key0\":\"a b\",\"key1\":\"&=?\"}")
    }

    #[test]
    fn js_interface_posts_through_named_object() {
        let channel = JsInterfaceChannel::default();
        assert_eq!(channel.object_name(), "androidJsBridge");
        let script = channel.install_script("kmpJsBridge");
        assert!(script.starts_with("window.kmpJsBridge.postMessage = function (message)"));
        assert!(script.contains("window.androidJsBridge.call(message);"));
    }

    #[test]
    fn custom_scheme_wire_format() {
        let channel = CustomSchemeChannel::default();
        let url = channel.encode(&message()).unwrap();
        assert!(url.starts_with("kmpbridge://call?message=%7B"));
        assert!(!url[channel.prefix().len()..].contains('&'));
        assert!(channel.is_bridge_url(&url));
        assert!(channel.is_bridge_url("KMPBRIDGE://call?message=x"));
        assert!(!channel.is_bridge_url("https://kmpbridge.test/"));
        assert_eq!(channel.decode(&url).unwrap(), message());
    }

    #[test]
    fn custom_scheme_script_encodes_the_envelope() {
        let script = CustomSchemeChannel::default().install_script("b");
        assert!(script.contains("\"kmpbridge://call?message=\" + encodeURIComponent(message)"));
    }

    #[test]
    fn custom_scheme_rejects_bad_urls() {
        let channel = CustomSchemeChannel::default();
        assert!(matches!(
            channel.decode("https://example.test/?message=%7B%7D"),
            Err(BridgeError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            channel.decode("kmpbridge://call"),
            Err(BridgeError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            channel.decode("kmpbridge://call?message=not%20json"),
            Err(BridgeError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn message_handler_posts_to_target() {
        let channel = MessageHandlerChannel::new("iosJsBridge", "window.webkit.messageHandlers.iosJsBridge");
        assert_eq!(channel.handler_name(), "iosJsBridge");
        let script = channel.install_script("kmpJsBridge");
        assert!(script.contains("window.webkit.messageHandlers.iosJsBridge.postMessage(message);"));
        assert_eq!(channel.decode(&channel.encode(&message()).unwrap()).unwrap(), message());
    }

    #[test]
    fn envelopes_with_missing_method_are_malformed() {
        let channel = JsInterfaceChannel::default();
        assert!(matches!(
            channel.decode(r#"{"callbackId":1}"#),
            Err(BridgeError::MalformedEnvelope(_))
        ));
    }
}
