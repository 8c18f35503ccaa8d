// src/transport/stream/mod.rs

//! Newline-delimited JSON transport.
//!
//! Carries messages as text over any tokio byte stream: a TCP socket, a
//! Unix socket, a child process's stdio, or an in-process duplex pipe. Each
//! message is one JSON array on its own line. Blank lines are ignored.
//!
//! A line that is not a valid message is a transport error and stops the
//! session reading it.

mod transport;

pub use transport::{StreamSink, StreamSource, StreamTransport};
