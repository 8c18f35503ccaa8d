//! Public, transport-agnostic session configuration.
//!
//! Nothing here depends on how messages travel; the same config drives an
//! in-process session and one speaking JSON over a socket.

use crate::client::MAX_SAFE_CALL_ID;

/// What to do when the peer invokes a function that is not registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFunctionPolicy {
    /// Report a diagnostic and send nothing back. The caller's callback, if
    /// any, stays pending for the life of its session.
    #[default]
    Ignore,

    /// Report a diagnostic and, when the caller asked for a result, resolve
    /// the call with an error whose `code` field is `"UNKNOWN_FUNCTION"`.
    Reply,
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    // ---
    /// Label used to tell sessions apart in log output.
    pub session_id: String,

    /// Highest call id handed out before the counter wraps.
    ///
    /// Default: `2^53 - 1`, the largest integer every JSON peer reads exactly.
    pub max_call_id: i64,

    /// Handling of invocations for unregistered functions.
    ///
    /// Default: [`UnknownFunctionPolicy::Ignore`]
    pub unknown_function: UnknownFunctionPolicy,

    /// Number of protocol violations buffered per diagnostics subscriber
    /// before the oldest are dropped.
    ///
    /// Default: 64
    pub diagnostic_capacity: usize,
}

impl RpcConfig {
    /// Create a config with defaults and the given log label.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            max_call_id: MAX_SAFE_CALL_ID,
            unknown_function: UnknownFunctionPolicy::default(),
            diagnostic_capacity: 64,
        }
    }

    /// Set the id wrap threshold.
    pub fn with_max_call_id(mut self, max_call_id: i64) -> Self {
        self.max_call_id = max_call_id;
        self
    }

    /// Set the unknown-function policy.
    ///
    /// # Example
    ///
    /// ```
    /// use rpc_stream::{RpcConfig, UnknownFunctionPolicy};
    ///
    /// let config = RpcConfig::new("worker")
    ///     .with_unknown_function(UnknownFunctionPolicy::Reply);
    /// assert_eq!(config.unknown_function, UnknownFunctionPolicy::Reply);
    /// ```
    pub fn with_unknown_function(mut self, policy: UnknownFunctionPolicy) -> Self {
        self.unknown_function = policy;
        self
    }

    /// Set the diagnostic channel capacity.
    pub fn with_diagnostic_capacity(mut self, capacity: usize) -> Self {
        self.diagnostic_capacity = capacity;
        self
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::new("rpc")
    }
}
