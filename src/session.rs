//! RPC session.
//!
//! One [`RpcSession`] is one end of a duplex connection. It exposes local
//! functions to the peer and calls the peer's functions, over whatever
//! [`Transport`] it is run on. All state (pending calls, id counter, function
//! table) lives in the session, so any number of sessions can coexist in one
//! process.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::client::{Completion, RemoteFn, RemoteNames, Response};
use crate::error_codec::{ErrorCodec, Fault};
use crate::protocol::{CallId, Message};
use crate::router::{lock_ignore_poison, Router};
use crate::server::{Args, LocalFunctions, Reply};
use crate::transport::runner;
use crate::{
    // ---
    log_debug,
    ProtocolViolation,
    Result,
    RpcConfig,
    RpcError,
    SessionBuilder,
    Transport,
};

/// One endpoint of a bidirectional RPC connection.
///
/// Cheap to clone (internally `Arc`-backed).
///
/// # Example
///
/// ```
/// use rpc_stream::{create_memory_transport_pair, RpcSession};
/// use serde_json::json;
///
/// # async fn example() -> rpc_stream::Result<()> {
/// let (left, right) = create_memory_transport_pair();
///
/// let server = RpcSession::builder().session_id("server").build();
/// server.register_fn("add", |(a, b): (i64, i64)| Ok(a + b));
/// server.spawn(right);
///
/// let client = RpcSession::builder().session_id("client").build();
/// client.spawn(left);
///
/// let sum: i64 = client.remote("add").invoke(vec![json!(2), json!(3)]).await?;
/// assert_eq!(sum, 5);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcSession {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    session_id: String,
    router: Router,

    // Taken while the session is being driven.
    outbound: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
}

impl RpcSession {
    // ---

    /// Create a session with no local functions.
    pub fn new(config: RpcConfig) -> Self {
        // ---
        SessionBuilder::new().config(config).build()
    }

    pub fn builder() -> SessionBuilder {
        // ---
        SessionBuilder::new()
    }

    pub(crate) fn from_parts(config: RpcConfig, functions: LocalFunctions, codec: ErrorCodec) -> Self {
        // ---
        let (router, outbound) = Router::new(&config, functions, codec);

        Self {
            inner: Arc::new(Inner {
                session_id: config.session_id,
                router,
                outbound: Mutex::new(Some(outbound)),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        // ---
        &self.inner.session_id
    }

    /// Add or replace a local function with the raw `(args, reply)` signature.
    pub fn register<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(Args, Reply) -> std::result::Result<(), Fault> + Send + Sync + 'static,
    {
        // ---
        self.inner.router.with_functions(|table| {
            table.register(name, func);
        });
    }

    /// Add or replace a synchronous local function; see
    /// [`LocalFunctions::register_fn`].
    pub fn register_fn<F, Req, Resp>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(Req) -> std::result::Result<Resp, Fault> + Send + Sync + 'static,
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
    {
        // ---
        self.inner.router.with_functions(|table| {
            table.register_fn(name, func);
        });
    }

    /// Add or replace an async local function; see
    /// [`LocalFunctions::register_async`].
    pub fn register_async<F, Fut, Req, Resp>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Resp, Fault>> + Send + 'static,
        Req: DeserializeOwned + 'static,
        Resp: Serialize + Send + 'static,
    {
        // ---
        self.inner.router.with_functions(|table| {
            table.register_async(name, func);
        });
    }

    pub(crate) fn dispatch(&self, name: &str, args: Vec<Value>, callback: Option<Completion>) -> Result<CallId> {
        // ---
        self.inner.router.call(name, args, callback)
    }

    /// Call `name` on the peer and run `callback` with its resolution.
    pub fn call<F>(&self, name: &str, args: Vec<Value>, callback: F) -> Result<CallId>
    where
        F: FnOnce(Response) + Send + 'static,
    {
        // ---
        self.dispatch(name, args, Some(Box::new(callback)))
    }

    /// Call `name` on the peer without asking for a result.
    pub fn notify(&self, name: &str, args: Vec<Value>) -> Result<()> {
        // ---
        self.dispatch(name, args, None).map(|_| ())
    }

    /// Call `name` on the peer and wait for its resolution.
    pub async fn request(&self, name: &str, args: Vec<Value>) -> Result<Response> {
        // ---
        self.remote(name).request(args).await
    }

    /// Stub for one remote function.
    pub fn remote(&self, name: &str) -> RemoteFn {
        // ---
        RemoteFn::new(name, self.clone())
    }

    /// Stubs for several remote functions, keyed by name.
    ///
    /// Accepts a single name, a list of names, or an object whose keys are
    /// the names.
    pub fn wrap(&self, names: impl Into<RemoteNames>) -> HashMap<String, RemoteFn> {
        // ---
        names
            .into()
            .into_vec()
            .into_iter()
            .map(|name| {
                let stub = RemoteFn::new(name.as_str(), self.clone());
                (name, stub)
            })
            .collect()
    }

    /// Feed one inbound message to the router.
    ///
    /// This is the whole inbound path; [`run`](Self::run) calls it for every
    /// message the transport delivers. Hosts that move messages themselves
    /// call it directly and drain [`take_outbound`](Self::take_outbound).
    pub fn handle_message(&self, msg: Message) {
        // ---
        self.inner.router.handle_message(msg);
    }

    /// Take the outbound message queue, for hosts that move messages
    /// themselves. Returns `None` if already taken or the session is running.
    pub fn take_outbound(&self) -> Option<mpsc::UnboundedReceiver<Message>> {
        // ---
        lock_ignore_poison(&self.inner.outbound).take()
    }

    /// Subscribe to protocol violations reported from now on.
    pub fn diagnostics(&self) -> broadcast::Receiver<ProtocolViolation> {
        // ---
        self.inner.router.subscribe_diagnostics()
    }

    /// Number of outbound calls still waiting for a resolution.
    pub fn pending_calls(&self) -> usize {
        // ---
        self.inner.router.pending_calls()
    }

    /// Drive the session over `transport` until the peer goes away.
    ///
    /// Returns `Ok(())` when the transport reports end of stream, or the
    /// first transport or decoding error. The session stays usable and can
    /// be run again on a new transport; calls pending at that point stay
    /// pending.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::AlreadyRunning`] if the session is already being
    /// driven or its outbound queue was taken.
    pub async fn run<T: Transport>(&self, transport: T) -> Result<()> {
        // ---
        let mut outbound = self.take_outbound().ok_or(RpcError::AlreadyRunning)?;

        log_debug!("[{}] session started", self.inner.session_id);
        let result = runner::drive(&self.inner.router, &mut outbound, transport).await;
        log_debug!("[{}] session stopped", self.inner.session_id);

        *lock_ignore_poison(&self.inner.outbound) = Some(outbound);
        result
    }

    /// Spawn [`run`](Self::run) onto the current tokio runtime.
    pub fn spawn<T>(&self, transport: T) -> JoinHandle<Result<()>>
    where
        T: Transport + 'static,
        T::Sink: 'static,
        T::Source: 'static,
    {
        // ---
        let session = self.clone();
        tokio::spawn(async move { session.run(transport).await })
    }
}

impl std::fmt::Debug for RpcSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcSession")
            .field("session_id", &self.inner.session_id)
            .field("pending_calls", &self.pending_calls())
            .finish_non_exhaustive()
    }
}
