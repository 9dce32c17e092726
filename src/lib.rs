//! A fixed-size worker pool with two shutdown drain modes.
//!
//! Submitted tasks run on a fixed set of worker threads in the order they
//! were submitted relative to each other's arrival. Shutting the pool down
//! either drains every already-queued task first, or lets only the
//! currently-running task(s) finish and discards the rest — see
//! [`Pool::destroy`].

mod error;
mod pool;
mod queue;
mod task;

pub use error::{PoolError, PoolResult};
pub use pool::Pool;
