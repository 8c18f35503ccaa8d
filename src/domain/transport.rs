// src/domain/transport.rs

//! Transport domain abstraction.
//!
//! A session needs exactly one thing from the outside world: an ordered,
//! bidirectional stream of [`Message`]s. This module defines that contract
//! without reference to sockets, pipes or framing.
//!
//! The two directions are separate halves. The session reads and writes at
//! the same time, so a slow write never stops it from reading the peer's
//! traffic.
//!
//! The transport is responsible only for moving whole messages in order.
//! Correlation, dispatch and error encoding are handled by the session.
//!
//! Concrete implementations live under `src/transport/`.

use crate::protocol::Message;
use crate::Result;

/// Outbound half of a transport.
///
/// Messages passed to `send()` must reach the peer in the order they were
/// sent.
///
/// # Notes
///
/// This trait uses `async_trait`; the expanded documentation may show explicit
/// lifetimes and a boxed `Future`. Treat the methods as normal `async fn`s.
#[async_trait::async_trait]
pub trait MessageSink: Send {
    // ---
    /// Deliver one message to the peer.
    async fn send(&mut self, msg: Message) -> Result<()>;

    /// Flush and release the outbound side.
    ///
    /// Called once when the session stops driving the transport.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Inbound half of a transport.
///
/// `recv()` yields the peer's messages in the order the peer sent them and
/// returns `Ok(None)` once the peer has finished. Any other error stops the
/// session reading it.
#[async_trait::async_trait]
pub trait MessageSource: Send {
    // ---
    /// Wait for the next message from the peer.
    async fn recv(&mut self) -> Result<Option<Message>>;
}

/// Ordered duplex message stream, used as two independent halves.
///
/// Any `(sink, source)` pair is a transport.
pub trait Transport: Send {
    // ---
    type Sink: MessageSink;
    type Source: MessageSource;

    /// Separate the outbound and inbound directions.
    fn split(self) -> (Self::Sink, Self::Source);
}

impl<Si, So> Transport for (Si, So)
where
    Si: MessageSink,
    So: MessageSource,
{
    type Sink = Si;
    type Source = So;

    fn split(self) -> (Si, So) {
        self
    }
}

#[async_trait::async_trait]
impl<T: MessageSink + ?Sized> MessageSink for Box<T> {
    // ---
    async fn send(&mut self, msg: Message) -> Result<()> {
        (**self).send(msg).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

#[async_trait::async_trait]
impl<T: MessageSource + ?Sized> MessageSource for Box<T> {
    // ---
    async fn recv(&mut self) -> Result<Option<Message>> {
        (**self).recv().await
    }
}

/// Boxed halves, for picking an implementation at runtime.
pub type SinkPtr = Box<dyn MessageSink>;
pub type SourcePtr = Box<dyn MessageSource>;
