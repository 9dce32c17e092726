//! The unit of work executed by a [`Pool`](crate::pool::Pool).

use std::fmt;

/// A type-erased closure submitted to a [`Pool`](crate::pool::Pool).
///
/// Replaces the (function pointer, opaque argument) pair of the original
/// design with a single boxed closure, eliminating the separate `arg`
/// parameter at the API surface.
pub(crate) struct Task(Box<dyn FnOnce() + Send + 'static>);

impl Task {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// Consumes the task and runs its closure exactly once.
    pub(crate) fn run(self) {
        (self.0)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish()
    }
}
