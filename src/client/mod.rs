// src/client/mod.rs
//! Caller side of a session.
//!
//! [`RemoteFn`] is a stub for one function on the peer. Invoking it with a
//! completion callback registers the callback in the session's
//! [`CorrelationRegistry`] under a fresh id; invoking it without one sends a
//! fire-and-forget invocation carrying [`CallId::NO_CALLBACK`].
//!
//! Completions are plain `FnOnce` callbacks. [`RemoteFn::request`] wraps one
//! around a tokio oneshot for callers that prefer to `.await` the result.
//!
//! # Ordering
//!
//! Multiple calls can be in flight at once. Each resolution is matched by id
//! alone, so results arrive in whatever order the peer completes them.

mod pending;

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use crate::error_codec::Fault;
use crate::protocol::CallId;
use crate::{Result, RpcError, RpcSession};

pub use pending::{CorrelationRegistry, MAX_SAFE_CALL_ID};

/// Completion handler for an outbound call; runs at most once.
pub type Completion = Box<dyn FnOnce(Response) + Send>;

/// Resolution of an outbound call as seen by the caller.
///
/// `error` is the decoded error slot (`None` on success); `values` are the
/// remaining result arguments, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub error: Option<Fault>,
    pub values: Vec<Value>,
}

impl Response {
    // ---

    pub fn new(error: Option<Fault>, values: Vec<Value>) -> Self {
        // ---
        Self { error, values }
    }

    pub fn is_ok(&self) -> bool {
        // ---
        self.error.is_none()
    }

    pub fn into_result(self) -> std::result::Result<Vec<Value>, Fault> {
        // ---
        match self.error {
            Some(fault) => Err(fault),
            None => Ok(self.values),
        }
    }

    /// Decode the first result value, failing with [`RpcError::Remote`] if
    /// the call failed. A call that resolved with no values decodes from
    /// `null`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        // ---
        let mut values = self.into_result().map_err(RpcError::Remote)?;
        let first = if values.is_empty() {
            Value::Null
        } else {
            values.swap_remove(0)
        };
        serde_json::from_value(first).map_err(|e| RpcError::InvalidArguments(e.to_string()))
    }
}

/// Caller-side stub for a named function on the peer.
///
/// Cheap to clone; every clone talks through the same session.
#[derive(Clone)]
pub struct RemoteFn {
    // ---
    name: Arc<str>,
    session: RpcSession,
}

impl RemoteFn {
    // ---

    pub(crate) fn new(name: impl Into<Arc<str>>, session: RpcSession) -> Self {
        // ---
        Self {
            name: name.into(),
            session,
        }
    }

    pub fn name(&self) -> &str {
        // ---
        &self.name
    }

    /// Invoke with an optional completion callback.
    ///
    /// An id is allocated only when `callback` is `Some`.
    pub fn send(&self, args: Vec<Value>, callback: Option<Completion>) -> Result<CallId> {
        // ---
        self.session.dispatch(&self.name, args, callback)
    }

    /// Invoke and run `callback` with the peer's resolution.
    pub fn call<F>(&self, args: Vec<Value>, callback: F) -> Result<CallId>
    where
        F: FnOnce(Response) + Send + 'static,
    {
        // ---
        self.send(args, Some(Box::new(callback)))
    }

    /// Invoke without asking for a result.
    pub fn notify(&self, args: Vec<Value>) -> Result<()> {
        // ---
        self.send(args, None).map(|_| ())
    }

    /// Invoke and wait for the resolution.
    ///
    /// No timeout is applied; wrap in `tokio::time::timeout` if the peer may
    /// never answer.
    pub async fn request(&self, args: Vec<Value>) -> Result<Response> {
        // ---
        let (tx, rx) = oneshot::channel();

        self.call(args, move |resp| {
            // Receiver gone means the caller stopped waiting.
            let _ = tx.send(resp);
        })?;

        rx.await.map_err(|_| RpcError::SessionClosed)
    }

    /// Invoke, wait, and decode the first result value.
    pub async fn invoke<T: DeserializeOwned>(&self, args: Vec<Value>) -> Result<T> {
        // ---
        self.request(args).await?.decode()
    }
}

impl std::fmt::Debug for RemoteFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFn").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Names accepted by [`RpcSession::wrap`]: a single name, a list of names,
/// or the keys of a JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNames(Vec<String>);

impl RemoteNames {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for RemoteNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_owned()])
    }
}

impl From<String> for RemoteNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for RemoteNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<&[&str]> for RemoteNames {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|n| (*n).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for RemoteNames {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|n| (*n).to_owned()).collect())
    }
}

impl From<&Map<String, Value>> for RemoteNames {
    fn from(object: &Map<String, Value>) -> Self {
        Self(object.keys().cloned().collect())
    }
}

impl<V> From<&HashMap<String, V>> for RemoteNames {
    fn from(object: &HashMap<String, V>) -> Self {
        Self(object.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_success() {
        // ---
        let resp = Response::new(None, vec![json!(5), json!("extra")]);
        assert_eq!(resp.decode::<i64>().unwrap(), 5);

        let empty = Response::new(None, vec![]);
        assert_eq!(empty.decode::<Option<i64>>().unwrap(), None);
    }

    #[test]
    fn test_decode_remote_error() {
        // ---
        let resp = Response::new(Some(Fault::from("nope")), vec![]);
        assert!(!resp.is_ok());
        match resp.decode::<i64>() {
            Err(RpcError::Remote(fault)) => assert_eq!(fault.message(), Some("nope")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_remote_names() {
        // ---
        assert_eq!(RemoteNames::from("add").into_vec(), vec!["add"]);
        assert_eq!(RemoteNames::from(["add", "sub"]).into_vec(), vec!["add", "sub"]);

        let object = json!({ "add": null, "sub": 1 });
        let mut names = RemoteNames::from(object.as_object().unwrap()).into_vec();
        names.sort();
        assert_eq!(names, vec!["add", "sub"]);
    }
}
