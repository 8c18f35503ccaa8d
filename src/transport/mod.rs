//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Transport` trait, plus the runner that connects a transport to a
//! session.
//!
//! Domain code must not depend on transport-specific types.

mod memory;
mod stream;

pub(crate) mod runner;

pub use memory::{create_transport_pair as create_memory_transport_pair, MemorySink, MemorySource, MemoryTransport};
pub use stream::{StreamSink, StreamSource, StreamTransport};
