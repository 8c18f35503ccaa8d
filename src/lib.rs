//! Bidirectional RPC over a single ordered message stream
//!
//! Each end of a connection is an [`RpcSession`]. A session exposes a table
//! of local functions to its peer and calls the peer's functions through
//! [`RemoteFn`] stubs. Both directions share one stream: outgoing calls are
//! *invocations* (`[name, args, id]`), their answers are *resolutions*
//! (`[args, id]`), matched by integer correlation id.
//!
//! Errors cross the stream as plain JSON records and are rebuilt on the far
//! side, so a function that fails on one end resolves the caller's call with
//! an error on the other.
//!
//! The session does no I/O itself. Give it a [`Transport`] with
//! [`RpcSession::run`] (in-process [`MemoryTransport`], or newline-delimited
//! JSON over any tokio byte stream with [`StreamTransport`]), or move
//! messages yourself with [`RpcSession::handle_message`] and
//! [`RpcSession::take_outbound`].
//!

// Import all sub modules once...
mod client;
mod domain;
mod router;
mod server;
mod transport;

mod macros;
mod protocol;

mod error;
mod error_codec;
mod rpc_config;
mod session;
mod session_builder;

pub mod codec;

pub(crate) use macros::{log_debug, log_error, log_warn};

// Re-export main types
pub use session::RpcSession;
pub use session_builder::SessionBuilder;

pub use rpc_config::{RpcConfig, UnknownFunctionPolicy};

pub use error::{ProtocolViolation, Result, RpcError};

pub use protocol::{CallId, Message};

pub use client::{
    // ---
    Completion,
    CorrelationRegistry,
    RemoteFn,
    RemoteNames,
    Response,
    MAX_SAFE_CALL_ID,
};

pub use server::{
    // ---
    Args,
    LocalFn,
    LocalFunctions,
    Method,
    Reply,
};

pub use error_codec::{
    // ---
    expand,
    expand_error,
    DefaultFlattener,
    ErrorCodec,
    Fault,
    FlattenError,
    RemoteError,
};

pub use transport::{
    // ---
    create_memory_transport_pair,
    MemorySink,
    MemorySource,
    MemoryTransport,
    StreamSink,
    StreamSource,
    StreamTransport,
};

// --- public re-exports
pub use domain::{
    //
    MessageSink,
    MessageSource,
    SinkPtr,
    SourcePtr,
    Transport,
};
