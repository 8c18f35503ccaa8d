//! JSON text encoding of [`Message`]s.
//!
//! One message is one JSON array. [`encode`] appends a trailing newline so
//! the output can be written straight onto a newline-delimited stream.

use bytes::Bytes;
use serde_json::Value;

use crate::protocol::Message;
use crate::Result;

/// Serialize a message as a newline-terminated JSON array.
pub fn encode(msg: &Message) -> Result<Bytes> {
    // ---
    let mut buf = serde_json::to_vec(msg)?;
    buf.push(b'\n');
    Ok(Bytes::from(buf))
}

/// Parse one message from JSON text.
///
/// Surrounding whitespace, including a trailing newline, is ignored.
///
/// # Errors
///
/// Returns [`RpcError::Serialization`](crate::RpcError::Serialization) if the
/// text is not a JSON array and
/// [`RpcError::MalformedMessage`](crate::RpcError::MalformedMessage) if the
/// array does not have the shape of an invocation or a resolution.
pub fn decode(data: &[u8]) -> Result<Message> {
    // ---
    let items: Vec<Value> = serde_json::from_slice(data)?;
    Message::try_from(items)
}
