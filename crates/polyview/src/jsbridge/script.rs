//! Script-side half of the bridge.
//!
//! Everything here is plain text generation: the bootstrap object installed
//! under `window.<ns>`, one stub per registered handler, and the callback
//! script that settles a waiting promise. Output is deterministic for a
//! given handler set.

use serde_json::Value;

use super::handler::HandlerRegistration;
use super::message::{JsMessage, NO_CALLBACK};
use super::BridgeError;

/// Bootstrap for `window.<ns>`: callback table, `callNative`, `onCallback`
/// and the parameter marshaller. Re-running it on a page that already has
/// the bridge is a no-op.
pub fn bootstrap(namespace: &str) -> String {
    format!(
        r#"if (!(window.{ns} && window.{ns}.__installed)) {{
  var bridge = window.{ns} || {{}};
  bridge.__installed = true;
  bridge.__callbacks = {{}};
  bridge.__nextId = 1;
  bridge.marshalParams = function (args) {{
    if (args.length === 0) {{
      return "";
    }}
    if (args.length === 1) {{
      var only = args[0];
      if (typeof only === "string") {{
        try {{
          JSON.parse(only);
          return only;
        }} catch (e) {{}}
      }}
      return JSON.stringify(only);
    }}
    var keyed = {{}};
    for (var i = 0; i < args.length; i++) {{
      keyed["key" + i] = args[i];
    }}
    return JSON.stringify(keyed);
  }};
  bridge.callNative = function (methodName, params, expectResult) {{
    var message = {{ callbackId: {no_callback}, methodName: methodName, params: params }};
    if (!expectResult) {{
      bridge.postMessage(JSON.stringify(message));
      return undefined;
    }}
    return new Promise(function (resolve, reject) {{
      var id = bridge.__nextId++;
      bridge.__callbacks[id] = {{ resolve: resolve, reject: reject }};
      message.callbackId = id;
      bridge.postMessage(JSON.stringify(message));
    }});
  }};
  bridge.onCallback = function (callbackId, result, error) {{
    var pending = bridge.__callbacks[callbackId];
    if (!pending) {{
      return;
    }}
    delete bridge.__callbacks[callbackId];
    if (error !== null && error !== undefined) {{
      pending.reject(new Error(error));
    }} else {{
      pending.resolve(result);
    }}
  }};
  window.{ns} = bridge;
}}
"#,
        ns = namespace,
        no_callback = NO_CALLBACK,
    )
}

/// One stub per registration, in the order given. Callers pass
/// registrations sorted by method name.
pub fn handler_stubs(namespace: &str, registrations: &[HandlerRegistration]) -> String {
    let mut out = String::new();
    for registration in registrations {
        out.push_str(&handler_stub(namespace, registration));
    }
    out
}

fn handler_stub(namespace: &str, registration: &HandlerRegistration) -> String {
    // JSON string literals are valid JS string literals.
    let name = Value::String(registration.method_name.clone()).to_string();
    format!(
        r#"window.{ns}[{name}] = function () {{
  var args = Array.prototype.slice.call(arguments);
  if (args.length < {min} || args.length > {max}) {{
    console.error("Invalid number of arguments for " + {name});
    return undefined;
  }}
  return window.{ns}.callNative({name}, window.{ns}.marshalParams(args), {expect});
}};
"#,
        ns = namespace,
        name = name,
        min = registration.min_param_count,
        max = registration.max_param_count,
        expect = registration.call_mode.expects_result(),
    )
}

/// Script settling the promise registered under `callback_id`. `error`
/// rejects it instead.
pub fn callback_script(namespace: &str, callback_id: i32, result: &str, error: Option<&str>) -> String {
    let result = Value::String(result.to_string());
    let error = match error {
        Some(e) => Value::String(e.to_string()).to_string(),
        None => "null".to_string(),
    };
    format!("window.{namespace}.onCallback({callback_id}, {result}, {error});")
}

/// Native rendition of the stub marshaller: empty for no arguments, a
/// JSON-valid string passed through, any other single value serialized,
/// several values keyed `key0..keyN`.
pub fn marshal_params(args: &[Value]) -> String {
    match args {
        [] => String::new(),
        [Value::String(s)] if serde_json::from_str::<Value>(s).is_ok() => s.clone(),
        [single] => single.to_string(),
        many => {
            let mut out = String::from("{");
            for (i, arg) in many.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&format!("\"key{i}\":{arg}"));
            }
            out.push('}');
            out
        }
    }
}

/// Build the envelope a stub would post for `args`, or the argument-count
/// error it would log.
pub fn plan_call(
    registration: &HandlerRegistration,
    args: &[Value],
    callback_id: i32,
) -> Result<JsMessage, BridgeError> {
    if !registration.accepts(args.len()) {
        return Err(BridgeError::ArgumentCount {
            method: registration.method_name.clone(),
            min: registration.min_param_count,
            max: registration.max_param_count,
            got: args.len(),
        });
    }
    let callback_id = if registration.call_mode.expects_result() {
        callback_id
    } else {
        NO_CALLBACK
    };
    Ok(JsMessage::new(
        callback_id,
        registration.method_name.clone(),
        marshal_params(args),
    ))
}
