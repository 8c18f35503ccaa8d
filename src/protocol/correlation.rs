use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation identifier linking an invocation to its resolution.
///
/// Ids are positive integers handed out by the caller's
/// [`CorrelationRegistry`](crate::client::CorrelationRegistry). The reserved
/// value [`CallId::NO_CALLBACK`] marks a fire-and-forget invocation for
/// which no resolution is ever sent.
///
/// # Wire format
///
/// A bare JSON integer, e.g. `2` or `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(i64);

impl CallId {
    // ---

    /// Sentinel id: the caller supplied no completion callback.
    pub const NO_CALLBACK: CallId = CallId(-1);

    /// Wrap a raw integer id.
    pub const fn new(id: i64) -> Self {
        // ---
        Self(id)
    }

    /// Get the raw integer value
    pub const fn get(self) -> i64 {
        // ---
        self.0
    }

    /// True for the fire-and-forget sentinel.
    pub const fn is_no_callback(self) -> bool {
        // ---
        self.0 == Self::NO_CALLBACK.0
    }
}

impl fmt::Display for CallId {
    // ---

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CallId {
    // ---

    fn from(id: i64) -> Self {
        // ---
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_sentinel() {
        // ---
        assert!(CallId::NO_CALLBACK.is_no_callback());
        assert!(!CallId::new(2).is_no_callback());
        assert_eq!(CallId::NO_CALLBACK.get(), -1);
    }

    #[test]
    fn test_wire_format() {
        // ---
        let id = CallId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        let back: CallId = serde_json::from_str("-1").unwrap();
        assert_eq!(back, CallId::NO_CALLBACK);
    }
}
