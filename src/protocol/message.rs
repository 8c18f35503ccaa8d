use crate::protocol::CallId;
use crate::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A unit exchanged with the peer.
///
/// # Wire format
///
/// Messages travel as positional JSON arrays:
///
/// - Invocation: `[name, args, id]`, e.g. `["add", [2, 3], 2]`
/// - Resolution: `[args, id]`, e.g. `[[null, 5], 2]`
///
/// Decoding reads from the end of the array: the id, then the argument
/// list, then an optional name. A name that is present but `null` decodes
/// as a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "Vec<Value>")]
pub enum Message {
    // ---
    /// Request to run the named function on the receiving side.
    Invocation {
        name: String,
        args: Vec<Value>,
        id: CallId,
    },

    /// Result of an invocation previously sent by the receiving side.
    ///
    /// `args[0]` is the error slot; `null` means success.
    Resolution { args: Vec<Value>, id: CallId },
}

impl Message {
    // ---

    /// Correlation id carried by either shape.
    pub fn id(&self) -> CallId {
        // ---
        match self {
            Message::Invocation { id, .. } | Message::Resolution { id, .. } => *id,
        }
    }
}

impl TryFrom<Vec<Value>> for Message {
    // ---
    type Error = RpcError;

    fn try_from(mut data: Vec<Value>) -> Result<Self, Self::Error> {
        // ---
        if data.len() < 2 || data.len() > 3 {
            return Err(RpcError::MalformedMessage(format!(
                "expected 2 or 3 elements, got {}",
                data.len()
            )));
        }

        let id = match data.pop() {
            Some(Value::Number(n)) => n.as_i64().map(CallId::new).ok_or_else(|| {
                RpcError::MalformedMessage(format!("call id {n} is not an integer"))
            })?,
            other => {
                return Err(RpcError::MalformedMessage(format!(
                    "call id must be an integer, got {other:?}"
                )))
            }
        };

        let args = match data.pop() {
            Some(Value::Array(args)) => args,
            other => {
                return Err(RpcError::MalformedMessage(format!(
                    "args must be an array, got {other:?}"
                )))
            }
        };

        match data.pop() {
            Some(Value::String(name)) => Ok(Message::Invocation { name, args, id }),
            None | Some(Value::Null) => Ok(Message::Resolution { args, id }),
            Some(other) => Err(RpcError::MalformedMessage(format!(
                "function name must be a string, got {other}"
            ))),
        }
    }
}

impl From<Message> for Vec<Value> {
    // ---

    fn from(msg: Message) -> Self {
        // ---
        match msg {
            Message::Invocation { name, args, id } => {
                vec![Value::String(name), Value::Array(args), Value::from(id.get())]
            }
            Message::Resolution { args, id } => vec![Value::Array(args), Value::from(id.get())],
        }
    }
}
