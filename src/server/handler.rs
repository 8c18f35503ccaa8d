use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error_codec::{expand_error, Fault, RemoteError};
use crate::protocol::{CallId, Message};
use crate::router::Outbound;
use crate::{log_debug, RpcError};

/// Type-erased local function
///
/// Receives the decoded invocation arguments and a one-shot [`Reply`].
/// Returning `Err` is equivalent to completing the reply with that fault.
///
/// Wrapped in Arc so lookups can release the table lock before calling.
pub type LocalFn = Arc<dyn Fn(Args, Reply) -> Result<(), Fault> + Send + Sync>;

/// Positional arguments of an inbound invocation.
///
/// When the leading argument is an error record it is also available,
/// rebuilt, through [`Args::error`]; the raw values are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    values: Vec<Value>,
    error: Option<RemoteError>,
}

impl Args {
    // ---

    pub fn new(values: Vec<Value>) -> Self {
        // ---
        let error = values.first().and_then(expand_error);
        Self { values, error }
    }

    /// Leading argument rebuilt as an error, if it was error-shaped.
    pub fn error(&self) -> Option<&RemoteError> {
        // ---
        self.error.as_ref()
    }

    pub fn into_values(self) -> Vec<Value> {
        // ---
        self.values
    }

    /// Decode the whole argument list, e.g. into a tuple `(i64, i64)` or a
    /// `Vec<T>`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, RpcError> {
        // ---
        serde_json::from_value(Value::Array(self.values.clone()))
            .map_err(|e| RpcError::InvalidArguments(e.to_string()))
    }
}

impl Deref for Args {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.values
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

struct ReplyState {
    id: CallId,
    outbound: Outbound,
    done: AtomicBool,
}

impl Drop for ReplyState {
    fn drop(&mut self) {
        if !self.id.is_no_callback() && !*self.done.get_mut() {
            log_debug!("call {} dropped without a reply; caller stays pending", self.id);
        }
    }
}

/// One-shot completion for an inbound invocation.
///
/// Only the first completion counts. For fire-and-forget invocations the
/// reply is accepted and discarded, so functions never need to know whether
/// the caller is listening.
///
/// A `Reply` may be moved into another task and completed later; the
/// resolution is sent whenever that happens.
pub struct Reply {
    state: Arc<ReplyState>,
}

impl Reply {
    // ---

    pub(crate) fn new(id: CallId, outbound: Outbound) -> Self {
        // ---
        Self {
            state: Arc::new(ReplyState {
                id,
                outbound,
                done: AtomicBool::new(false),
            }),
        }
    }

    /// Second handle on the same one-shot, kept by the router.
    pub(crate) fn handle(&self) -> Reply {
        // ---
        Reply {
            state: self.state.clone(),
        }
    }

    /// Correlation id of the invocation being answered.
    pub fn id(&self) -> CallId {
        // ---
        self.state.id
    }

    /// True when the caller supplied no callback and will never see a reply.
    pub fn is_fire_and_forget(&self) -> bool {
        // ---
        self.state.id.is_no_callback()
    }

    /// Complete with an error slot and result values.
    pub fn send(self, error: Option<Fault>, values: Vec<Value>) {
        // ---
        self.complete(error, values);
    }

    /// Complete successfully with a single value.
    pub fn ok(self, value: impl Into<Value>) {
        // ---
        self.complete(None, vec![value.into()]);
    }

    /// Complete with a fault and no values.
    pub fn err(self, fault: impl Into<Fault>) {
        // ---
        self.complete(Some(fault.into()), Vec::new());
    }

    pub(crate) fn complete(&self, error: Option<Fault>, values: Vec<Value>) {
        // ---
        let state = &self.state;

        if state.done.swap(true, Ordering::AcqRel) {
            log_debug!("call {} already completed, ignoring", state.id);
            return;
        }

        if state.id.is_no_callback() {
            return;
        }

        let mut args = Vec::with_capacity(values.len() + 1);
        args.push(state.outbound.codec().flatten(error));
        args.extend(values);

        // A closed outbound queue means the session is gone; nobody to tell.
        let _ = state.outbound.emit(Message::Resolution { args, id: state.id });
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, Fault> {
    // ---
    serde_json::to_value(value).map_err(|e| Fault::Error(RemoteError::from_error(&e)))
}

fn invalid_arguments(err: RpcError) -> Fault {
    // ---
    Fault::Error(RemoteError::from_error(&err).with_field("code", "INVALID_ARGUMENTS"))
}

/// Wrap a plain synchronous function into a [`LocalFn`]
///
/// The argument list is decoded into `Req` (a tuple for positional
/// arguments) and the returned value is sent as the single result.
pub(super) fn wrap_fn<F, Req, Resp>(func: F) -> LocalFn
where
    F: Fn(Req) -> Result<Resp, Fault> + Send + Sync + 'static,
    Req: DeserializeOwned + 'static,
    Resp: Serialize + 'static,
{
    // ---
    Arc::new(move |args: Args, reply: Reply| {
        let req: Req = args.decode().map_err(invalid_arguments)?;
        let resp = to_value(func(req)?)?;
        reply.ok(resp);
        Ok(())
    })
}

/// Wrap an async function into a [`LocalFn`]
///
/// The future runs on the current tokio runtime and the reply is sent when it
/// finishes, so replies may leave in a different order than their
/// invocations arrived.
pub(super) fn wrap_async<F, Fut, Req, Resp>(func: F) -> LocalFn
where
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, Fault>> + Send + 'static,
    Req: DeserializeOwned + 'static,
    Resp: Serialize + Send + 'static,
{
    // ---
    Arc::new(move |args: Args, reply: Reply| {
        let req: Req = args.decode().map_err(invalid_arguments)?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Fault::Error(RemoteError::from_error(&e)))?;

        let fut = func(req);
        runtime.spawn(async move {
            match fut.await.and_then(to_value) {
                Ok(value) => reply.ok(value),
                Err(fault) => reply.err(fault),
            }
        });
        Ok(())
    })
}
