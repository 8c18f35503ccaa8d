//! Call router.
//!
//! The router is the protocol state machine of a session. Every inbound
//! message passes through [`Router::handle_message`], which either runs a
//! local function (invocation) or completes a pending call (resolution).
//! Outbound messages are pushed onto an unbounded queue that the transport
//! runner drains; the router itself never waits on the transport.
//!
//! Handling one inbound message runs to completion synchronously and emits at
//! most one message. Functions that defer their [`Reply`] emit later, from
//! whatever task completes them.
//!
//! Faults attributable to the peer (unknown call ids, unknown function names)
//! are reported as [`ProtocolViolation`]s on the diagnostic channel and logged;
//! they never stop the session.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::client::{Completion, CorrelationRegistry, Response};
use crate::error_codec::{ErrorCodec, Fault, RemoteError};
use crate::protocol::{CallId, Message};
use crate::server::{Args, LocalFunctions, Reply};
use crate::{
    // ---
    log_debug,
    log_warn,
    ProtocolViolation,
    Result,
    RpcConfig,
    RpcError,
    UnknownFunctionPolicy,
};

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The guarded state (pending calls, function table) is only ever mutated by
/// single map operations, and no user code runs while a guard is held.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read_ignore_poison<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    // ---
    match l.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_ignore_poison<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    // ---
    match l.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Sending half of the outbound queue, plus the codec used for error slots.
#[derive(Clone)]
pub(crate) struct Outbound {
    tx: mpsc::UnboundedSender<Message>,
    codec: ErrorCodec,
}

impl Outbound {
    // ---

    pub(crate) fn new(tx: mpsc::UnboundedSender<Message>, codec: ErrorCodec) -> Self {
        // ---
        Self { tx, codec }
    }

    pub(crate) fn codec(&self) -> &ErrorCodec {
        // ---
        &self.codec
    }

    pub(crate) fn emit(&self, msg: Message) -> Result<()> {
        // ---
        self.tx.send(msg).map_err(|_| RpcError::SessionClosed)
    }
}

pub(crate) struct Router {
    // ---
    session_id: String,
    unknown_function: UnknownFunctionPolicy,
    registry: Mutex<CorrelationRegistry>,
    functions: RwLock<LocalFunctions>,
    outbound: Outbound,
    diagnostics: broadcast::Sender<ProtocolViolation>,
}

impl Router {
    // ---

    /// Create a router and the receiving end of its outbound queue.
    pub(crate) fn new(
        config: &RpcConfig,
        functions: LocalFunctions,
        codec: ErrorCodec,
    ) -> (Self, mpsc::UnboundedReceiver<Message>) {
        // ---
        let (tx, rx) = mpsc::unbounded_channel();
        let (diagnostics, _) = broadcast::channel(config.diagnostic_capacity.max(1));

        let router = Self {
            session_id: config.session_id.clone(),
            unknown_function: config.unknown_function,
            registry: Mutex::new(CorrelationRegistry::with_max_id(config.max_call_id)),
            functions: RwLock::new(functions),
            outbound: Outbound::new(tx, codec),
            diagnostics,
        };

        (router, rx)
    }

    /// Route one inbound message.
    pub(crate) fn handle_message(&self, msg: Message) {
        // ---
        match msg {
            Message::Invocation { name, args, id } => self.invoke(name, args, id),
            Message::Resolution { args, id } => self.resolve(args, id),
        }
    }

    /// Issue an invocation to the peer.
    ///
    /// With a completion handler the call gets a fresh id from the registry;
    /// without one it is sent with the fire-and-forget sentinel.
    pub(crate) fn call(&self, name: &str, args: Vec<Value>, completion: Option<Completion>) -> Result<CallId> {
        // ---
        let id = match completion {
            Some(handler) => lock_ignore_poison(&self.registry)
                .allocate(handler)
                .ok_or(RpcError::CallIdsExhausted)?,
            None => CallId::NO_CALLBACK,
        };

        let msg = Message::Invocation {
            name: name.to_owned(),
            args,
            id,
        };

        if let Err(err) = self.outbound.emit(msg) {
            if !id.is_no_callback() {
                lock_ignore_poison(&self.registry).take(id);
            }
            return Err(err);
        }

        log_debug!("[{}] call {name} (id {id})", self.session_id);
        Ok(id)
    }

    /// Mutate the function table; no function runs while the lock is held.
    pub(crate) fn with_functions<R>(&self, f: impl FnOnce(&mut LocalFunctions) -> R) -> R {
        // ---
        f(&mut write_ignore_poison(&self.functions))
    }

    pub(crate) fn pending_calls(&self) -> usize {
        // ---
        lock_ignore_poison(&self.registry).len()
    }

    pub(crate) fn subscribe_diagnostics(&self) -> broadcast::Receiver<ProtocolViolation> {
        // ---
        self.diagnostics.subscribe()
    }

    fn invoke(&self, name: String, args: Vec<Value>, id: CallId) {
        // ---
        let args = Args::new(args);

        // Clone the function out so the table lock is not held while it runs.
        let function = read_ignore_poison(&self.functions).lookup(&name);

        let Some(function) = function else {
            self.unknown_function(name, id);
            return;
        };

        let reply = Reply::new(id, self.outbound.clone());
        let guard = reply.handle();

        let fault = match panic::catch_unwind(AssertUnwindSafe(|| function(args, reply))) {
            Ok(Ok(())) => return,
            Ok(Err(fault)) => fault,
            Err(payload) => Fault::Error(RemoteError::new(panic_message(payload.as_ref()))),
        };

        log_debug!("[{}] function {name} failed: {fault}", self.session_id);
        guard.complete(Some(fault), Vec::new());
    }

    fn unknown_function(&self, name: String, id: CallId) {
        // ---
        if self.unknown_function == UnknownFunctionPolicy::Reply && !id.is_no_callback() {
            let err = RemoteError::new(format!("no function named {name:?}")).with_field("code", "UNKNOWN_FUNCTION");
            let args = vec![self.outbound.codec().flatten(Some(err.into()))];
            let _ = self.outbound.emit(Message::Resolution { args, id });
        }

        self.report(ProtocolViolation::UnknownFunction { name, id });
    }

    fn resolve(&self, mut args: Vec<Value>, id: CallId) {
        // ---
        // Removed before it runs: a second resolution for the same id finds
        // nothing, even if the handler panics.
        let handler = lock_ignore_poison(&self.registry).take(id);

        let Some(handler) = handler else {
            self.report(ProtocolViolation::UnknownCallId(id));
            return;
        };

        let error = if args.is_empty() {
            None
        } else {
            self.outbound.codec().expand(args.remove(0))
        };

        handler(Response::new(error, args));
    }

    fn report(&self, violation: ProtocolViolation) {
        // ---
        log_warn!("[{}] {violation}", self.session_id);

        // No subscribers is fine; the warning above is the record.
        let _ = self.diagnostics.send(violation);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    // ---
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "local function panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn router(functions: LocalFunctions) -> (Router, mpsc::UnboundedReceiver<Message>) {
        Router::new(&RpcConfig::new("test"), functions, ErrorCodec::default())
    }

    fn add_table() -> LocalFunctions {
        let mut functions = LocalFunctions::new();
        functions.register("add", |args, reply| {
            let a = args[0].as_i64().unwrap_or_default();
            let b = args[1].as_i64().unwrap_or_default();
            reply.send(None, vec![json!(a + b)]);
            Ok(())
        });
        functions.register("boom", |_args, _reply| Err(RemoteError::new("boom").into()));
        functions.register("panics", |_args, _reply| panic!("kaboom"));
        functions
    }

    #[test]
    fn test_invocation_emits_resolution() {
        // ---
        let (router, mut out) = router(add_table());

        router.handle_message(Message::Invocation {
            name: "add".into(),
            args: vec![json!(2), json!(3)],
            id: CallId::new(2),
        });

        assert_eq!(
            out.try_recv().unwrap(),
            Message::Resolution {
                args: vec![Value::Null, json!(5)],
                id: CallId::new(2),
            }
        );
    }

    #[test]
    fn test_returned_error_is_flattened() {
        // ---
        let (router, mut out) = router(add_table());

        router.handle_message(Message::Invocation {
            name: "boom".into(),
            args: vec![],
            id: CallId::new(9),
        });

        assert_eq!(
            out.try_recv().unwrap(),
            Message::Resolution {
                args: vec![json!({ "message": "boom" })],
                id: CallId::new(9),
            }
        );
    }

    #[test]
    fn test_panic_becomes_error_resolution() {
        // ---
        let (router, mut out) = router(add_table());

        router.handle_message(Message::Invocation {
            name: "panics".into(),
            args: vec![],
            id: CallId::new(4),
        });

        match out.try_recv().unwrap() {
            Message::Resolution { args, .. } => assert_eq!(args[0]["message"], json!("kaboom")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_fire_and_forget_never_responds() {
        // ---
        let (router, mut out) = router(add_table());

        for name in ["add", "boom", "panics"] {
            router.handle_message(Message::Invocation {
                name: name.into(),
                args: vec![json!(1), json!(1)],
                id: CallId::NO_CALLBACK,
            });
        }

        assert!(out.try_recv().is_err());
    }

    #[test]
    fn test_unknown_function_is_reported() {
        // ---
        let (router, mut out) = router(add_table());
        let mut diagnostics = router.subscribe_diagnostics();

        router.handle_message(Message::Invocation {
            name: "mul".into(),
            args: vec![],
            id: CallId::new(3),
        });

        assert!(out.try_recv().is_err());
        assert_eq!(
            diagnostics.try_recv().unwrap(),
            ProtocolViolation::UnknownFunction {
                name: "mul".into(),
                id: CallId::new(3),
            }
        );
    }

    #[test]
    fn test_unknown_function_reply_policy() {
        // ---
        let config = RpcConfig::new("test").with_unknown_function(UnknownFunctionPolicy::Reply);
        let (router, mut out) = Router::new(&config, LocalFunctions::new(), ErrorCodec::default());

        router.handle_message(Message::Invocation {
            name: "mul".into(),
            args: vec![],
            id: CallId::new(3),
        });

        match out.try_recv().unwrap() {
            Message::Resolution { args, id } => {
                assert_eq!(id, CallId::new(3));
                assert_eq!(args[0]["code"], json!("UNKNOWN_FUNCTION"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_resolution_runs_handler_once() {
        // ---
        let (router, mut out) = router(LocalFunctions::new());
        let mut diagnostics = router.subscribe_diagnostics();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let id = router
            .call(
                "add",
                vec![json!(2), json!(3)],
                Some(Box::new(move |resp: Response| sink.lock().unwrap().push(resp))),
            )
            .unwrap();

        assert_eq!(id, CallId::new(2));
        assert_eq!(router.pending_calls(), 1);
        assert!(matches!(out.try_recv().unwrap(), Message::Invocation { .. }));

        for _ in 0..2 {
            router.handle_message(Message::Resolution {
                args: vec![Value::Null, json!(5)],
                id,
            });
        }

        assert_eq!(*seen.lock().unwrap(), vec![Response::new(None, vec![json!(5)])]);
        assert_eq!(router.pending_calls(), 0);
        assert_eq!(diagnostics.try_recv().unwrap(), ProtocolViolation::UnknownCallId(id));
    }

    #[test]
    fn test_resolution_error_slot_is_expanded() {
        // ---
        let (router, _out) = router(LocalFunctions::new());
        let seen = Arc::new(Mutex::new(None));

        let sink = seen.clone();
        let id = router
            .call("x", vec![], Some(Box::new(move |resp: Response| *sink.lock().unwrap() = Some(resp))))
            .unwrap();

        router.handle_message(Message::Resolution {
            args: vec![json!({ "message": "boom", "code": 7 })],
            id,
        });

        let resp = seen.lock().unwrap().take().unwrap();
        let err = resp.error.as_ref().and_then(Fault::as_error).unwrap();
        assert_eq!(err.message, "boom");
        assert_eq!(err.field("code"), Some(&json!(7)));
        assert!(resp.values.is_empty());
    }

    #[test]
    fn test_call_on_closed_session_releases_id() {
        // ---
        let (router, out) = router(LocalFunctions::new());
        drop(out);

        let res = router.call("x", vec![], Some(Box::new(|_| {})));
        assert!(matches!(res, Err(RpcError::SessionClosed)));
        assert_eq!(router.pending_calls(), 0);
    }

    #[test]
    fn test_call_fails_when_ids_exhausted() {
        // ---
        let config = RpcConfig::new("test").with_max_call_id(2);
        let (router, mut out) = Router::new(&config, LocalFunctions::new(), ErrorCodec::default());

        assert_eq!(router.call("x", vec![], Some(Box::new(|_| {}))).unwrap(), CallId::new(2));
        assert_eq!(router.call("x", vec![], Some(Box::new(|_| {}))).unwrap(), CallId::new(1));

        let res = router.call("x", vec![], Some(Box::new(|_| {})));
        assert!(matches!(res, Err(RpcError::CallIdsExhausted)));
        assert_eq!(router.pending_calls(), 2);

        // fire-and-forget needs no id
        assert_eq!(router.call("x", vec![], None).unwrap(), CallId::NO_CALLBACK);

        let sent: Vec<CallId> = std::iter::from_fn(|| out.try_recv().ok()).map(|m| m.id()).collect();
        assert_eq!(sent, vec![CallId::new(2), CallId::new(1), CallId::NO_CALLBACK]);

        // a resolution frees its id for the next call
        router.handle_message(Message::Resolution {
            args: vec![Value::Null],
            id: CallId::new(2),
        });
        assert_eq!(router.call("x", vec![], Some(Box::new(|_| {}))).unwrap(), CallId::new(2));
    }
}
