use std::collections::HashMap;

use crate::client::{Completion, Response};
use crate::protocol::CallId;

/// Largest integer a double-precision JSON reader represents exactly (`2^53 - 1`).
///
/// Ids are carried as JSON numbers, so staying below this keeps them exact
/// for every peer.
pub const MAX_SAFE_CALL_ID: i64 = (1 << 53) - 1;

/// Tracks pending calls waiting for a resolution
///
/// Maps correlation ids to the completion handler supplied by the caller.
/// An entry lives from the moment its invocation is sent until exactly one
/// resolution is received for it, or the registry is dropped, in which case
/// the handler is simply never run.
pub struct CorrelationRegistry {
    // ---
    pending: HashMap<CallId, Completion>,
    current: i64,
    max_id: i64,
}

impl CorrelationRegistry {
    // ---

    /// Create an empty registry wrapping at [`MAX_SAFE_CALL_ID`].
    pub fn new() -> Self {
        // ---
        Self::with_max_id(MAX_SAFE_CALL_ID)
    }

    /// Create an empty registry that wraps ids after `max_id`.
    ///
    /// `max_id` must exceed the number of calls ever outstanding at once.
    pub fn with_max_id(max_id: i64) -> Self {
        // ---
        Self {
            pending: HashMap::new(),
            current: 1,
            max_id: max_id.max(2),
        }
    }

    /// Store `handler` under a fresh id and return that id.
    ///
    /// Ids strictly increase until one at or above the wrap threshold has been
    /// handed out; the counter then restarts from 1. Ids still outstanding
    /// after a wrap are skipped.
    ///
    /// Returns `None`, and drops `handler`, when every id in `1..=max_id` is
    /// outstanding.
    pub fn allocate(&mut self, handler: Completion) -> Option<CallId> {
        // ---
        // Every pending id lies in 1..=max_id, so a free one exists below this.
        if self.pending.len() as i64 >= self.max_id {
            return None;
        }

        let id = loop {
            self.current += 1;
            let candidate = CallId::new(self.current);
            if self.current >= self.max_id {
                self.current = 0;
            }
            if !self.pending.contains_key(&candidate) {
                break candidate;
            }
        };

        self.pending.insert(id, handler);
        Some(id)
    }

    /// Remove and return the handler for `id`.
    ///
    /// The entry is gone before the caller gets to run the handler, so a
    /// handler that panics or a duplicate resolution cannot trigger it again.
    pub fn take(&mut self, id: CallId) -> Option<Completion> {
        // ---
        self.pending.remove(&id)
    }

    /// Complete a pending call with the resolution payload
    ///
    /// Returns true if `id` was pending and its handler ran. Returns false for
    /// unknown ids; the caller reports that as a protocol violation.
    pub fn resolve(&mut self, id: CallId, response: Response) -> bool {
        // ---
        match self.take(id) {
            Some(handler) => {
                handler(response);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: CallId) -> bool {
        // ---
        self.pending.contains_key(&id)
    }

    /// Get the number of pending calls
    pub fn len(&self) -> usize {
        // ---
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        // ---
        self.pending.is_empty()
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn noop() -> Completion {
        Box::new(|_| {})
    }

    #[test]
    fn test_first_id_is_two() {
        // ---
        let mut registry = CorrelationRegistry::new();
        assert_eq!(registry.allocate(noop()), Some(CallId::new(2)));
        assert_eq!(registry.allocate(noop()), Some(CallId::new(3)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_resolve_runs_handler_once() {
        // ---
        let mut registry = CorrelationRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let id = registry
            .allocate(Box::new(move |resp: Response| {
                assert_eq!(resp.values, vec![json!(5)]);
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        let response = Response::new(None, vec![json!(5)]);
        assert!(registry.resolve(id, response.clone()));
        assert!(!registry.resolve(id, response));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_id() {
        // ---
        let mut registry = CorrelationRegistry::new();
        assert!(registry.take(CallId::new(99)).is_none());
        assert!(!registry.resolve(CallId::new(99), Response::new(None, vec![])));
    }

    #[test]
    fn test_wrap_skips_outstanding() {
        // ---
        let mut registry = CorrelationRegistry::with_max_id(4);

        let ids: Vec<i64> = (0..3).map(|_| registry.allocate(noop()).unwrap().get()).collect();
        assert_eq!(ids, vec![2, 3, 4]);

        // 2 is still outstanding, 3 has been resolved
        assert!(registry.take(CallId::new(3)).is_some());

        assert_eq!(registry.allocate(noop()), Some(CallId::new(1)));
        assert_eq!(registry.allocate(noop()), Some(CallId::new(3)));
        assert!(registry.contains(CallId::new(2)));
    }

    #[test]
    fn test_exhausted_ids() {
        // ---
        let mut registry = CorrelationRegistry::with_max_id(3);

        let ids: Vec<i64> = (0..3).map(|_| registry.allocate(noop()).unwrap().get()).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        assert_eq!(registry.allocate(noop()), None);
        assert_eq!(registry.len(), 3);

        // freeing one id makes allocation possible again
        assert!(registry.take(CallId::new(3)).is_some());
        assert_eq!(registry.allocate(noop()), Some(CallId::new(3)));
        assert_eq!(registry.allocate(noop()), None);
    }
}
