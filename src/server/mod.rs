/// Local function table: the functions this endpoint exposes to its peer
mod handler;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error_codec::Fault;

pub use handler::{Args, LocalFn, Reply};

/// Method of a shared object, as exposed by [`LocalFunctions::from_object`].
pub type Method<T> = fn(&T, Args, Reply) -> Result<(), Fault>;

/// Mapping from function name to implementation.
///
/// Built once up front (from an object or from `(name, function)` pairs) and
/// extended one entry at a time with the `register*` methods. Registering an
/// existing name replaces it. There is no removal.
///
/// # Example
///
/// ```
/// use rpc_stream::LocalFunctions;
///
/// let mut functions = LocalFunctions::new();
///
/// // exact (args, reply) signature
/// functions.register("ping", |_args, reply| {
///     reply.ok("pong");
///     Ok(())
/// });
///
/// // plain function, positional arguments decoded with serde
/// functions.register_fn("add", |(a, b): (i64, i64)| Ok(a + b));
///
/// assert!(functions.lookup("add").is_some());
/// assert!(functions.lookup("sub").is_none());
/// ```
#[derive(Clone, Default)]
pub struct LocalFunctions {
    // ---
    functions: HashMap<String, LocalFn>,
}

impl LocalFunctions {
    // ---

    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Expose methods of a shared object.
    ///
    /// Each method is bound to `object`, so every exposed function sees the
    /// same receiver.
    pub fn from_object<T>(object: Arc<T>, methods: &[(&str, Method<T>)]) -> Self
    where
        T: Send + Sync + 'static,
    {
        // ---
        let mut table = Self::new();
        for &(name, method) in methods {
            let object = object.clone();
            table.register(name, move |args, reply| method(&object, args, reply));
        }
        table
    }

    /// Add or replace a function with the raw `(args, reply)` signature.
    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(Args, Reply) -> Result<(), Fault> + Send + Sync + 'static,
    {
        // ---
        self.functions.insert(name.into(), Arc::new(func));
        self
    }

    /// Add a synchronous function whose arguments decode into `Req` and
    /// whose return value becomes the single result.
    pub fn register_fn<F, Req, Resp>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(Req) -> Result<Resp, Fault> + Send + Sync + 'static,
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
    {
        // ---
        self.functions.insert(name.into(), handler::wrap_fn(func));
        self
    }

    /// Add an async function; its reply is sent when the future completes.
    ///
    /// Must be invoked from within a tokio runtime.
    pub fn register_async<F, Fut, Req, Resp>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, Fault>> + Send + 'static,
        Req: DeserializeOwned + 'static,
        Resp: Serialize + Send + 'static,
    {
        // ---
        self.functions.insert(name.into(), handler::wrap_async(func));
        self
    }

    pub fn lookup(&self, name: &str) -> Option<LocalFn> {
        // ---
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        // ---
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        // ---
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        // ---
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        // ---
        self.functions.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, LocalFn)> for LocalFunctions {
    // ---

    fn from_iter<I: IntoIterator<Item = (N, LocalFn)>>(iter: I) -> Self {
        // ---
        Self {
            functions: iter.into_iter().map(|(name, f)| (name.into(), f)).collect(),
        }
    }
}

impl fmt::Debug for LocalFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}
