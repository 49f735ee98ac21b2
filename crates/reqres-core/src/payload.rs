use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

/// Data handed to [`crate::ResponseContext::send`]. The variant decides how the body is typed.
#[derive(Clone, PartialEq, Default)]
pub enum Payload {
    /// No body at all; the response is finalized as-is.
    #[default]
    Empty,
    /// Text whose media type is sniffed when none was set.
    Text(String),
    /// Raw bytes, always sent as `application/octet-stream`.
    Binary(Bytes),
    /// A value serialized to JSON, or JSONP when a callback is set.
    Json(Value),
}

impl Payload {
    pub fn text<S>(text: S) -> Self
    where
        S: Into<String>,
    {
        Self::Text(text.into())
    }

    pub fn binary<B>(bytes: B) -> Self
    where
        B: Into<Bytes>,
    {
        Self::Binary(bytes.into())
    }

    pub fn json<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize,
    {
        serde_json::to_value(value).map(Self::Json)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.debug_tuple("Payload::Empty").finish(),
            Payload::Text(text) => f
                .debug_struct("Payload::Text")
                .field("len", &text.len())
                .finish(),
            Payload::Binary(bytes) => f
                .debug_struct("Payload::Binary")
                .field("len", &bytes.len())
                .finish(),
            Payload::Json(_) => f.debug_tuple("Payload::Json").finish(),
        }
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::text(value)
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::binary(value)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Payload::Binary(Bytes::copy_from_slice(value))
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Payload::Binary(value)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl<T> From<Option<T>> for Payload
where
    T: Into<Payload>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}
