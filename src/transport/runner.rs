//! Session execution runner.
//!
//! This module provides the glue between a [`Transport`] and a session's
//! [`Router`]. It is the only place where the two meet:
//! - outbound messages queued by the router are written to the sink
//! - inbound messages read from the source are handed to the router
//!
//! ## Two loops
//!
//! [`drive`] splits the transport and runs a read loop and a write loop
//! concurrently on the calling task. A write that waits on a full pipe
//! never stops the read loop, so two sessions flooding each other keep
//! draining each other's output. Each inbound message is routed to
//! completion before the next one is read, so inbound order is preserved
//! end to end.
//!
//! ## Shutdown
//!
//! When the source reports end of stream, the write loop flushes messages
//! already queued (for example, replies to the last invocations received)
//! best-effort and the sink is closed. An error from either half stops both
//! loops and is returned to the caller.

use tokio::sync::{mpsc, oneshot};

use crate::protocol::Message;
use crate::router::Router;
use crate::{
    // ---
    log_debug,
    log_error,
    log_warn,
    MessageSink,
    MessageSource,
    Result,
    Transport,
};

/// Pump messages between `router` and `transport` until the peer goes away.
pub(crate) async fn drive<T>(router: &Router, outbound: &mut mpsc::UnboundedReceiver<Message>, transport: T) -> Result<()>
where
    T: Transport,
{
    // ---
    let (mut sink, mut source) = transport.split();
    let (eof_tx, eof_rx) = oneshot::channel();

    let reader = async {
        let result = read_loop(router, &mut source).await;
        if result.is_ok() {
            // Receiver gone means the write loop already failed.
            let _ = eof_tx.send(());
        }
        result
    };
    let writer = write_loop(outbound, &mut sink, eof_rx);

    // First error cancels the other loop.
    let result = tokio::try_join!(reader, writer).map(|_| ());

    if let Err(_err) = sink.close().await {
        log_warn!("transport close failed: {_err}");
    }

    if let Err(_err) = &result {
        log_error!("transport stopped: {_err}");
    }

    result
}

async fn read_loop<S: MessageSource>(router: &Router, source: &mut S) -> Result<()> {
    // ---
    while let Some(msg) = source.recv().await? {
        router.handle_message(msg);
    }

    log_debug!("transport reached end of stream");
    Ok(())
}

async fn write_loop<S: MessageSink>(
    outbound: &mut mpsc::UnboundedReceiver<Message>,
    sink: &mut S,
    mut eof: oneshot::Receiver<()>,
) -> Result<()> {
    // ---
    loop {
        tokio::select! {
            biased;

            msg = outbound.recv() => match msg {
                Some(msg) => sink.send(msg).await?,
                None => return Ok(()),
            },
            _ = &mut eof => {
                flush(outbound, sink).await;
                return Ok(());
            }
        }
    }
}

async fn flush<S: MessageSink>(outbound: &mut mpsc::UnboundedReceiver<Message>, sink: &mut S) {
    // ---
    while let Ok(msg) = outbound.try_recv() {
        if let Err(_err) = sink.send(msg).await {
            log_debug!("dropping queued messages: {_err}");
            return;
        }
    }
}
