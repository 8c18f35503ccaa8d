//! RPC session builder.
//!
//! Provides a fluent builder API for assembling a session from its local
//! functions, error flattening strategy and configuration.

use crate::error_codec::{ErrorCodec, FlattenError};
use crate::server::{Args, LocalFunctions, Reply};
use crate::{Fault, RpcConfig, RpcSession, UnknownFunctionPolicy};

/// Builder for creating [`RpcSession`] instances.
///
/// # Examples
///
/// ```
/// use rpc_stream::{Fault, RpcSession, UnknownFunctionPolicy};
/// use serde_json::json;
///
/// let session = RpcSession::builder()
///     .session_id("worker-1")
///     .unknown_function(UnknownFunctionPolicy::Reply)
///     .flatten_errors(|fault: Fault| json!({ "message": fault.to_string(), "name": "WorkerError" }))
///     .function("ping", |_args, reply| {
///         reply.ok("pong");
///         Ok(())
///     })
///     .build();
///
/// assert_eq!(session.session_id(), "worker-1");
/// ```
pub struct SessionBuilder {
    // ---
    config: RpcConfig,
    functions: LocalFunctions,
    codec: ErrorCodec,
}

impl SessionBuilder {
    /// Create a builder with default configuration and no functions.
    pub fn new() -> Self {
        // ---
        Self {
            config: RpcConfig::default(),
            functions: LocalFunctions::new(),
            codec: ErrorCodec::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: RpcConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the label used in log output.
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.config.session_id = id.into();
        self
    }

    /// Set the call id wrap threshold.
    ///
    /// Default: `2^53 - 1`.
    pub fn max_call_id(mut self, max_call_id: i64) -> Self {
        self.config.max_call_id = max_call_id;
        self
    }

    /// Set the unknown-function policy.
    ///
    /// Default: [`UnknownFunctionPolicy::Ignore`].
    pub fn unknown_function(mut self, policy: UnknownFunctionPolicy) -> Self {
        self.config.unknown_function = policy;
        self
    }

    /// Start from an existing function table.
    pub fn functions(mut self, functions: LocalFunctions) -> Self {
        self.functions = functions;
        self
    }

    /// Add one function with the raw `(args, reply)` signature.
    pub fn function<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Args, Reply) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.functions.register(name, func);
        self
    }

    /// Replace the default error flattening strategy.
    pub fn flatten_errors(mut self, flattener: impl FlattenError + 'static) -> Self {
        self.codec = ErrorCodec::new(flattener);
        self
    }

    /// Build the session (consumes self).
    pub fn build(self) -> RpcSession {
        // ---
        RpcSession::from_parts(self.config, self.functions, self.codec)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
