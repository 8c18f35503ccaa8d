// src/transport/stream/transport.rs

use tokio::io::{
    // ---
    split,
    AsyncBufReadExt,
    AsyncRead,
    AsyncWrite,
    AsyncWriteExt,
    BufReader,
    Lines,
    ReadHalf,
    WriteHalf,
};

use crate::protocol::Message;
use crate::{
    // ---
    codec,
    log_debug,
    MessageSink,
    MessageSource,
    Result,
    Transport,
};

/// Writing half of a [`StreamTransport`]: one JSON line per message.
pub struct StreamSink<W> {
    writer: W,
}

/// Reading half of a [`StreamTransport`].
pub struct StreamSource<R> {
    lines: Lines<BufReader<R>>,
}

/// Newline-delimited JSON over a reader and a writer.
pub struct StreamTransport<R, W> {
    // ---
    source: StreamSource<R>,
    sink: StreamSink<W>,
}

impl<R, W> StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    // ---

    /// Read messages from `reader`, write them to `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        // ---
        Self {
            source: StreamSource {
                lines: BufReader::new(reader).lines(),
            },
            sink: StreamSink { writer },
        }
    }
}

impl<S> StreamTransport<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send,
{
    /// Use one bidirectional stream for both directions.
    pub fn from_stream(stream: S) -> Self {
        // ---
        let (reader, writer) = split(stream);
        Self::new(reader, writer)
    }
}

impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    type Sink = StreamSink<W>;
    type Source = StreamSource<R>;

    fn split(self) -> (StreamSink<W>, StreamSource<R>) {
        (self.sink, self.source)
    }
}

#[async_trait::async_trait]
impl<W> MessageSink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    // ---

    async fn send(&mut self, msg: Message) -> Result<()> {
        // ---
        let line = codec::encode(&msg)?;
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // ---
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R> MessageSource for StreamSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    // ---

    async fn recv(&mut self) -> Result<Option<Message>> {
        // ---
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            return codec::decode(line.as_bytes()).map(Some);
        }

        log_debug!("stream reached end of input");
        Ok(None)
    }
}

#[async_trait::async_trait]
impl<R, W> MessageSink for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, msg: Message) -> Result<()> {
        self.sink.send(msg).await
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await
    }
}

#[async_trait::async_trait]
impl<R, W> MessageSource for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<Message>> {
        self.source.recv().await
    }
}

impl<R, W> std::fmt::Debug for StreamTransport<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport").finish_non_exhaustive()
    }
}
