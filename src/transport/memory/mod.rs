// src/transport/memory/mod.rs

//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. Messages travel as [`Message`](crate::Message) values,
//! never as text. It is intended for tests, for two sessions in one process,
//! and as the reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! - Messages are delivered in send order, without loss.
//! - Delivery is deterministic within a single process.
//! - Closing or dropping one end makes the other end's `recv()` report end
//!   of stream once the messages already sent have been read.

mod transport;

pub use transport::{create_transport_pair, MemorySink, MemorySource, MemoryTransport};
