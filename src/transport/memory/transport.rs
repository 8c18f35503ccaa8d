// src/transport/memory/transport.rs

//! In-memory transport implementation.
//!
//! Two [`MemoryTransport`]s created together form a connected pair: what one
//! sends, the other receives.

use tokio::sync::mpsc;

use crate::protocol::Message;
use crate::{
    // ---
    MessageSink,
    MessageSource,
    Result,
    RpcError,
    Transport,
};

/// Sending half of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemorySink {
    tx: Option<mpsc::UnboundedSender<Message>>,
}

/// Receiving half of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Message>,
}

/// One end of an in-process message pipe.
///
/// ## Semantics
///
/// - Unbounded: `send()` never waits for the peer.
/// - `send()` fails with [`RpcError::SessionClosed`] once the other end has
///   been dropped.
/// - `close()` ends the outbound direction only; messages from the peer can
///   still be received.
///
/// Usable directly (it implements both halves) or through
/// [`Transport::split`].
#[derive(Debug)]
pub struct MemoryTransport {
    // ---
    sink: MemorySink,
    source: MemorySource,
}

impl MemoryTransport {
    // ---

    /// Create a connected pair of transports.
    pub fn pair() -> (Self, Self) {
        // ---
        let (left_tx, right_rx) = mpsc::unbounded_channel();
        let (right_tx, left_rx) = mpsc::unbounded_channel();

        let left = Self {
            sink: MemorySink { tx: Some(left_tx) },
            source: MemorySource { rx: left_rx },
        };
        let right = Self {
            sink: MemorySink { tx: Some(right_tx) },
            source: MemorySource { rx: right_rx },
        };

        (left, right)
    }
}

impl Transport for MemoryTransport {
    type Sink = MemorySink;
    type Source = MemorySource;

    fn split(self) -> (MemorySink, MemorySource) {
        (self.sink, self.source)
    }
}

#[async_trait::async_trait]
impl MessageSink for MemorySink {
    // ---

    async fn send(&mut self, msg: Message) -> Result<()> {
        // ---
        let tx = self.tx.as_ref().ok_or(RpcError::SessionClosed)?;
        tx.send(msg).map_err(|_| RpcError::SessionClosed)
    }

    /// Drop the sending half so the peer sees end of stream.
    async fn close(&mut self) -> Result<()> {
        // ---
        self.tx = None;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageSource for MemorySource {
    // ---

    async fn recv(&mut self) -> Result<Option<Message>> {
        // ---
        Ok(self.rx.recv().await)
    }
}

#[async_trait::async_trait]
impl MessageSink for MemoryTransport {
    async fn send(&mut self, msg: Message) -> Result<()> {
        self.sink.send(msg).await
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await
    }
}

#[async_trait::async_trait]
impl MessageSource for MemoryTransport {
    async fn recv(&mut self) -> Result<Option<Message>> {
        self.source.recv().await
    }
}

/// Create a connected pair of in-memory transports.
///
/// This transport is always available and requires no external resources.
pub fn create_transport_pair() -> (MemoryTransport, MemoryTransport) {
    // ---
    MemoryTransport::pair()
}
