//! Conversion between local errors and their wire form.
//!
//! Locally an error is a [`RemoteError`]: a message plus arbitrary extra
//! fields, usable anywhere a `std::error::Error` is expected. On the wire it
//! is a plain JSON object carrying at least a `message` key.
//!
//! The error slot of a call may also hold values that are not errors at all
//! (a string, a numeric failure code). [`Fault`] covers both cases, and the
//! codec passes non-error values through untouched.
//!
//! Flattening is pluggable through [`FlattenError`]; expansion always uses
//! the fixed strategy in [`expand`].

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

/// Error reported by, or destined for, the peer.
///
/// `fields` holds every key of the flat record other than `message`
/// (for instance a `code`), and is copied back onto the wire by the default
/// flattener.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    pub fields: Map<String, Value>,
}

impl RemoteError {
    // ---

    pub fn new(message: impl Into<String>) -> Self {
        // ---
        Self {
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Attach an extra field, e.g. `code`.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        // ---
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        // ---
        self.fields.get(key)
    }

    /// Capture any error by its display text.
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        // ---
        Self::new(err.to_string())
    }
}

/// Content of a non-empty error slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// A real error, rebuilt from (or flattened into) a record with a `message`.
    Error(RemoteError),

    /// Any other failure value, passed through unchanged.
    Value(Value),
}

impl Fault {
    // ---

    /// Error message, if this fault is an error or a bare string.
    pub fn message(&self) -> Option<&str> {
        // ---
        match self {
            Fault::Error(err) => Some(&err.message),
            Fault::Value(Value::String(s)) => Some(s),
            Fault::Value(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&RemoteError> {
        // ---
        match self {
            Fault::Error(err) => Some(err),
            Fault::Value(_) => None,
        }
    }
}

impl fmt::Display for Fault {
    // ---

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        match self {
            Fault::Error(err) => write!(f, "{err}"),
            Fault::Value(Value::String(s)) => f.write_str(s),
            Fault::Value(v) => write!(f, "{v}"),
        }
    }
}

impl From<RemoteError> for Fault {
    fn from(err: RemoteError) -> Self {
        Fault::Error(err)
    }
}

impl From<Value> for Fault {
    fn from(value: Value) -> Self {
        Fault::Value(value)
    }
}

impl From<&str> for Fault {
    fn from(s: &str) -> Self {
        Fault::Value(Value::String(s.to_owned()))
    }
}

impl From<String> for Fault {
    fn from(s: String) -> Self {
        Fault::Value(Value::String(s))
    }
}

/// Strategy for turning a local fault into its wire value.
///
/// Hosts install their own strategy to preserve information the default
/// drops, e.g. an error `name` used to rebuild custom error kinds.
/// Any `Fn(Fault) -> Value` closure is a strategy.
pub trait FlattenError: Send + Sync {
    fn flatten(&self, fault: Fault) -> Value;
}

impl<F> FlattenError for F
where
    F: Fn(Fault) -> Value + Send + Sync,
{
    fn flatten(&self, fault: Fault) -> Value {
        self(fault)
    }
}

/// Default strategy: `{ "message": ..., ...fields }` for errors, identity
/// for every other value.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFlattener;

impl FlattenError for DefaultFlattener {
    // ---

    fn flatten(&self, fault: Fault) -> Value {
        // ---
        match fault {
            Fault::Error(err) => {
                let mut record = Map::with_capacity(err.fields.len() + 1);
                record.insert("message".to_owned(), Value::String(err.message));
                for (key, value) in err.fields {
                    if key != "message" {
                        record.insert(key, value);
                    }
                }
                Value::Object(record)
            }
            Fault::Value(value) => value,
        }
    }
}

/// Loose truthiness (`null`, `false`, `0`, `NaN` and `""` are false), which
/// decides whether a `message` field counts.
fn truthy(value: &Value) -> bool {
    // ---
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Rebuild a [`RemoteError`] from a flat record, if the value is one.
///
/// A value is error-shaped when it is an object whose `message` field is
/// truthy. Every other key is copied onto the error.
pub fn expand_error(value: &Value) -> Option<RemoteError> {
    // ---
    let record = value.as_object()?;
    let message = record.get("message").filter(|m| truthy(m))?;

    let message = match message {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let fields = record
        .iter()
        .filter(|(key, _)| key.as_str() != "message")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Some(RemoteError { message, fields })
}

/// Decode an error slot.
///
/// `null` means success and yields `None`. Error-shaped records become
/// [`Fault::Error`]; anything else is passed through as [`Fault::Value`].
pub fn expand(value: Value) -> Option<Fault> {
    // ---
    if value.is_null() {
        return None;
    }

    match expand_error(&value) {
        Some(err) => Some(Fault::Error(err)),
        None => Some(Fault::Value(value)),
    }
}

/// Per-session codec: a pluggable flatten strategy paired with the fixed
/// expansion.
#[derive(Clone)]
pub struct ErrorCodec {
    flattener: Arc<dyn FlattenError>,
}

impl ErrorCodec {
    // ---

    pub fn new(flattener: impl FlattenError + 'static) -> Self {
        // ---
        Self {
            flattener: Arc::new(flattener),
        }
    }

    /// Encode an error slot; `None` encodes as `null`.
    pub fn flatten(&self, fault: Option<Fault>) -> Value {
        // ---
        match fault {
            Some(fault) => self.flattener.flatten(fault),
            None => Value::Null,
        }
    }

    pub fn expand(&self, value: Value) -> Option<Fault> {
        // ---
        expand(value)
    }
}

impl Default for ErrorCodec {
    fn default() -> Self {
        Self::new(DefaultFlattener)
    }
}

impl fmt::Debug for ErrorCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_error_keeps_fields() {
        // ---
        let err = RemoteError::new("boom").with_field("code", "E_BOOM");
        let flat = DefaultFlattener.flatten(err.into());
        assert_eq!(flat, json!({ "message": "boom", "code": "E_BOOM" }));
    }

    #[test]
    fn test_flatten_passes_values_through() {
        // ---
        assert_eq!(DefaultFlattener.flatten(Fault::from("nope")), json!("nope"));
        assert_eq!(DefaultFlattener.flatten(Fault::from(json!(404))), json!(404));
    }

    #[test]
    fn test_expand_record() {
        // ---
        let fault = expand(json!({ "message": "boom", "code": 7 })).unwrap();
        let err = fault.as_error().unwrap();
        assert_eq!(err.message, "boom");
        assert_eq!(err.field("code"), Some(&json!(7)));
        assert!(err.field("message").is_none());
    }

    #[test]
    fn test_expand_non_errors() {
        // ---
        assert_eq!(expand(Value::Null), None);
        assert_eq!(expand(json!("nope")), Some(Fault::from("nope")));
        // empty message is falsy, so the record stays a plain value
        assert_eq!(
            expand(json!({ "message": "" })),
            Some(Fault::Value(json!({ "message": "" })))
        );
        assert!(expand_error(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_custom_flattener() {
        // ---
        let codec = ErrorCodec::new(|fault: Fault| json!({ "message": fault.to_string(), "name": "Custom" }));
        let flat = codec.flatten(Some(RemoteError::new("bad").into()));
        assert_eq!(flat, json!({ "message": "bad", "name": "Custom" }));
        assert_eq!(codec.flatten(None), Value::Null);
    }

    #[test]
    fn test_error_trait() {
        // ---
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = RemoteError::from_error(&io);
        assert_eq!(err.to_string(), "disk gone");
    }
}
