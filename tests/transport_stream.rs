use std::time::Duration;

use serde_json::json;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

use rpc_stream::{
    //
    Result,
    RpcError,
    RpcSession,
    StreamTransport,
};

fn adder(id: &str) -> RpcSession {
    // ---
    let session = RpcSession::builder().session_id(id).build();
    session.register_fn("add", |(a, b): (i64, i64)| Ok(a + b));
    session
}

#[tokio::test]
async fn test_sessions_over_byte_stream() -> Result<()> {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (a, b) = duplex(4096);

    let server = adder("stream-server");
    server.spawn(StreamTransport::from_stream(a));

    let client = RpcSession::builder().session_id("stream-client").build();
    client.spawn(StreamTransport::from_stream(b));

    let sum: i64 = client.remote("add").invoke(vec![json!(2), json!(3)]).await?;
    assert_eq!(sum, 5);

    Ok(())
}

#[tokio::test]
async fn test_bursts_both_ways_over_small_pipe() -> Result<()> {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    // pipe far smaller than one burst, so writes block until the peer reads
    let (a, b) = duplex(256);

    let left = RpcSession::builder().session_id("burst-left").build();
    let right = RpcSession::builder().session_id("burst-right").build();
    for session in [&left, &right] {
        session.register_fn("echo", |(text,): (String,)| Ok(text));
    }

    left.spawn(StreamTransport::from_stream(a));
    right.spawn(StreamTransport::from_stream(b));

    let payload = "x".repeat(1000);
    let mut calls = Vec::new();

    for i in 0..20 {
        for (session, side) in [(&left, "left"), (&right, "right")] {
            let text = format!("{side}-{i}-{payload}");
            let echo = session.remote("echo");
            calls.push(tokio::spawn(async move {
                let back: String = echo.invoke(vec![json!(text.clone())]).await?;
                assert_eq!(back, text);
                Ok::<(), RpcError>(())
            }));
        }
    }

    let all = async {
        for call in calls {
            call.await.expect("call task panicked")?;
        }
        Ok::<(), RpcError>(())
    };
    tokio::time::timeout(Duration::from_secs(5), all)
        .await
        .expect("calls stalled on a full pipe")?;

    assert_eq!(left.pending_calls(), 0);
    assert_eq!(right.pending_calls(), 0);

    Ok(())
}

#[tokio::test]
async fn test_json_lines_on_the_wire() -> Result<()> {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (local, remote) = duplex(4096);
    let server = adder("lines-server");
    let task = server.spawn(StreamTransport::from_stream(local));

    let (reader, mut writer) = tokio::io::split(remote);
    let mut lines = BufReader::new(reader).lines();

    writer.write_all(b"[\"add\",[2,3],2]\n").await?;
    assert_eq!(lines.next_line().await?.as_deref(), Some("[[null,5],2]"));

    // fire-and-forget gets no line back; the next answer is for id 3
    writer.write_all(b"[\"add\",[1,1],-1]\n[\"add\",[4,4],3]\n").await?;
    assert_eq!(lines.next_line().await?.as_deref(), Some("[[null,8],3]"));

    // end of input stops the session and closes its side
    writer.shutdown().await?;
    task.await.expect("session task panicked")?;
    assert_eq!(lines.next_line().await?, None);

    // the session can be driven again on a new stream
    let (again, peer) = duplex(64);
    let task = server.spawn(StreamTransport::from_stream(again));
    drop(peer);
    task.await.expect("session task panicked")?;

    Ok(())
}

#[tokio::test]
async fn test_malformed_line_stops_session() {
    // ---
    #[cfg(feature = "logging")]
    init_logging();

    let (local, mut remote) = duplex(4096);
    let server = adder("garbage-server");
    let task = server.spawn(StreamTransport::from_stream(local));

    remote.write_all(b"[\"add\",[1,2],2,\"extra\"]\n").await.unwrap();

    let result = task.await.expect("session task panicked");
    assert!(matches!(result, Err(RpcError::MalformedMessage(_))));
}

#[cfg(feature = "logging")]
mod imp {
    use std::sync::Once;

    static INIT: Once = Once::new();

    pub fn init() {
        INIT.call_once(|| {
            let _ = env_logger::builder().is_test(true).try_init();
        });
    }
}

#[cfg(not(feature = "logging"))]
mod imp {
    #[inline]
    pub fn init() {}
}

pub fn init_logging() {
    imp::init();
}
