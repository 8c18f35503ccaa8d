use thiserror::Error;

use crate::error_codec::Fault;
use crate::protocol::CallId;

/// Errors that can occur during RPC operations
#[derive(Error, Debug)]
pub enum RpcError {
    /// The peer resolved the call with an error.
    #[error("remote error: {0}")]
    Remote(Fault),

    /// A message did not have the shape of an invocation or a resolution.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Arguments or results could not be decoded into the expected type.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying byte stream failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The session was dropped or its transport closed.
    #[error("session closed")]
    SessionClosed,

    /// Every correlation id up to the configured maximum is still waiting
    /// for a resolution.
    #[error("no free call id: every id is still pending")]
    CallIdsExhausted,

    /// `run()` was called while the session is already being driven.
    #[error("session is already running")]
    AlreadyRunning,
}

/// Misbehaviour attributable to the peer.
///
/// These are never returned as errors. The router logs them and publishes
/// them on the session's diagnostic channel (see
/// [`RpcSession::diagnostics`](crate::RpcSession::diagnostics)), then keeps
/// processing messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A resolution arrived for an id with no pending call.
    ///
    /// Either the id was never issued, it was already resolved, or the peer
    /// mixed up its ids.
    #[error("invalid callback id ({0})")]
    UnknownCallId(CallId),

    /// An invocation named a function that is not registered locally.
    #[error("no local function named {name:?} (call id {id})")]
    UnknownFunction { name: String, id: CallId },
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;
