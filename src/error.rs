//! Error types for the pool's public API.

use std::fmt;

/// The result type returned by [`Pool::submit`](crate::pool::Pool::submit).
pub type PoolResult = Result<(), PoolError>;

/// An error produced by the pool's public API.
///
/// Construction-time failures (a worker thread could not be spawned) are not
/// represented here: they are fatal and terminate the process, since the
/// pool's invariants cannot be restored from a partially constructed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// A task was submitted after [`destroy`](crate::pool::Pool::destroy)
    /// had already begun.
    Rejected,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => write!(
                f,
                "task rejected: the pool is shutting down or has been destroyed"
            )?,
        }
        Ok(())
    }
}

impl std::error::Error for PoolError {}
