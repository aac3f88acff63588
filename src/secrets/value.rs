//! Secret keys and values, and byte coercion of values.
//!
//! Input values arrive in one of a few shapes: text from the command line or a
//! JSON string, raw bytes, structured JSON (numbers, booleans, arrays,
//! objects), or a readable stream such as stdin. [`SecretValue`] is the closed
//! set of those shapes, built at the input boundary so backends match on it
//! exhaustively.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::types::SecretString;
use crate::errors::{Result, SyncError};

/// A boxed async byte source used for streamed values.
pub type ValueStream = Box<dyn AsyncRead + Send + Unpin>;

/// A non-empty secret identifier.
///
/// Backend-specific character rules are left to the wrapped service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretKey(String);

impl SecretKey {
    /// Validate and wrap a key. Fails with [`SyncError::InvalidKey`] when empty.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(SyncError::invalid_key("key must not be empty"));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SecretKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A secret value in one of its accepted input shapes.
pub enum SecretValue {
    /// UTF-8 text
    Text(SecretString),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// A non-string JSON value (number, boolean, array or object)
    Json(serde_json::Value),
    /// A readable byte stream, drained on demand
    Stream(ValueStream),
}

impl SecretValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(SecretString::new(value))
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(value.into())
    }

    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream(Box::new(reader))
    }

    /// Convert a decoded JSON field value. `null` is an absent value.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Self::text(s)),
            other => Some(Self::Json(other)),
        }
    }

    /// Short name of the value's shape, used in logs and errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Bytes(_) => "binary",
            Self::Json(serde_json::Value::Number(_)) => "number",
            Self::Json(serde_json::Value::Bool(_)) => "boolean",
            Self::Json(serde_json::Value::Array(_)) => "array",
            Self::Json(_) => "object",
            Self::Stream(_) => "stream",
        }
    }

    /// Size in bytes when known without draining a stream.
    pub fn known_len(&self) -> Option<usize> {
        match self {
            Self::Text(s) => Some(s.len()),
            Self::Bytes(b) => Some(b.len()),
            Self::Json(v) => Some(v.to_string().len()),
            Self::Stream(_) => None,
        }
    }

    /// Reject present-but-empty text.
    pub fn ensure_present(&self) -> Result<()> {
        match self {
            Self::Text(s) if s.is_empty() => Err(SyncError::invalid_value("empty string value")),
            _ => Ok(()),
        }
    }

    /// Coerce the value into bytes.
    ///
    /// Bytes pass through, streams are drained, text is encoded as UTF-8 and
    /// structured JSON is rendered as compact JSON text.
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Text(s) => Ok(s.into_inner().into_bytes()),
            Self::Bytes(b) => Ok(b),
            Self::Json(v) => Ok(v.to_string().into_bytes()),
            Self::Stream(mut reader) => {
                let mut buf = Vec::with_capacity(4096);
                reader
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| SyncError::io(e, "reading value stream"))?;
                Ok(buf)
            }
        }
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(_) => write!(f, "SecretValue::Text([REDACTED])"),
            Self::Bytes(b) => write!(f, "SecretValue::Bytes({} bytes)", b.len()),
            Self::Json(_) => write!(f, "SecretValue::Json([REDACTED])"),
            Self::Stream(_) => write!(f, "SecretValue::Stream"),
        }
    }
}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

impl From<&str> for SecretValue {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<Vec<u8>> for SecretValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Coerce an optional value into bytes, failing with
/// [`SyncError::InvalidValue`] when the value is absent.
pub async fn to_bytes(value: Option<SecretValue>) -> Result<Vec<u8>> {
    match value {
        Some(value) => value.into_bytes().await,
        None => Err(SyncError::invalid_value("nil value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secret_key_rejects_empty() {
        assert!(matches!(SecretKey::new(""), Err(SyncError::InvalidKey { .. })));
        assert_eq!(SecretKey::new("/app/db").unwrap().as_str(), "/app/db");
    }

    #[tokio::test]
    async fn test_to_bytes_nil_fails() {
        let err = to_bytes(None).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn test_to_bytes_text_and_bytes() {
        assert_eq!(to_bytes(Some("x".into())).await.unwrap(), b"x");

        let raw = vec![0u8, 159, 146, 150];
        assert_eq!(to_bytes(Some(SecretValue::bytes(raw.clone()))).await.unwrap(), raw);
    }

    #[tokio::test]
    async fn test_to_bytes_renders_json_scalars() {
        let int = SecretValue::from_json(json!(1)).unwrap();
        assert_eq!(int.into_bytes().await.unwrap(), b"1");

        let pi = SecretValue::from_json(json!(std::f64::consts::PI)).unwrap();
        assert_eq!(pi.into_bytes().await.unwrap(), b"3.141592653589793");

        let flag = SecretValue::from_json(json!(false)).unwrap();
        assert_eq!(flag.into_bytes().await.unwrap(), b"false");

        let nested = SecretValue::from_json(json!({"k1": "v1"})).unwrap();
        assert_eq!(nested.into_bytes().await.unwrap(), br#"{"k1":"v1"}"#);
    }

    #[tokio::test]
    async fn test_to_bytes_drains_stream() {
        let value = SecretValue::stream(std::io::Cursor::new(b"streamed value".to_vec()));
        assert_eq!(value.into_bytes().await.unwrap(), b"streamed value");
    }

    #[test]
    fn test_from_json_null_is_absent() {
        assert!(SecretValue::from_json(serde_json::Value::Null).is_none());
        assert!(matches!(SecretValue::from_json(json!("v")), Some(SecretValue::Text(_))));
        assert!(matches!(SecretValue::from_json(json!([1, 2])), Some(SecretValue::Json(_))));
    }

    #[test]
    fn test_ensure_present() {
        assert!(SecretValue::text("").ensure_present().is_err());
        assert!(SecretValue::text("v").ensure_present().is_ok());
        assert!(SecretValue::bytes(Vec::new()).ensure_present().is_ok());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(SecretValue::text("v").type_name(), "text");
        assert_eq!(SecretValue::bytes(vec![1]).type_name(), "binary");
        assert_eq!(SecretValue::from_json(json!(7)).unwrap().type_name(), "number");
        assert_eq!(SecretValue::from_json(json!(true)).unwrap().type_name(), "boolean");
        assert_eq!(SecretValue::stream(tokio::io::empty()).type_name(), "stream");
    }

    #[test]
    fn test_debug_redacts() {
        let debug = format!("{:?}", SecretValue::text("hunter2"));
        assert!(!debug.contains("hunter2"));
    }
}
