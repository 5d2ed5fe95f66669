//! Cooperative cancellation for in-flight batches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag.
///
/// Cloning is cheap; all clones observe the same flag. Workers check it at
/// phase boundaries and once per chunk, so cancellation takes effect at the
/// next chunk rather than instantly.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create a new, un-cancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of all work sharing this handle.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_handle_starts_clear() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn test_cancel_visible_through_clones() {
        let handle = CancelHandle::new();
        let clone = handle.clone();

        handle.cancel();

        assert!(clone.is_cancelled());
    }
}
