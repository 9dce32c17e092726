//! Fixed-size worker pool with two shutdown drain modes.

use crate::{
    error::{PoolError, PoolResult},
    queue::Fifo,
    task::Task,
};
use parking_lot::{Condvar, Mutex};
use std::{
    num::NonZeroUsize,
    panic,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
};

/// A fixed set of worker threads that execute submitted closures.
///
/// # Examples
/// ```
/// # use drain_pool::Pool;
/// # use std::{num::NonZeroUsize, sync::{Arc, Mutex}};
/// #
/// let pool = Pool::new(NonZeroUsize::new(2).unwrap());
///
/// let count = Arc::new(Mutex::new(0));
///
/// for _ in 0..4 {
///     let count = Arc::clone(&count);
///     pool.submit(move || {
///         *count.lock().unwrap() += 1;
///     })
///     .unwrap();
/// }
///
/// // Drain every queued task before tearing the pool down.
/// pool.destroy(true);
///
/// assert_eq!(*count.lock().unwrap(), 4);
/// ```
#[derive(Debug)]
pub struct Pool {
    size: NonZeroUsize,

    /// The state a worker thread needs access to. Held behind its own
    /// `Arc` rather than having workers hold a reference to `Pool` itself,
    /// so that a `Pool` going out of scope always runs `Drop` promptly —
    /// workers keep the queue and counters alive, never the pool handle,
    /// so there is no reference cycle between the two.
    shared: Arc<Shared>,

    /// Single-shot gate for `destroy`. Independent of `shared`'s locks:
    /// its only job is an atomic read-and-set, and reading it from
    /// `submit` never needs to be serialized against anything else.
    destroyed: AtomicBool,

    /// Taken and joined by whichever `destroy` call performs the real
    /// teardown. `None` once that has happened.
    workers: Mutex<Option<Vec<JoinHandle<()>>>>,
}

/// State shared between `Pool` and its worker threads.
#[derive(Debug)]
struct Shared {
    /// Guards the FIFO and the `finish` flag. Paired with `queue_cond`
    /// (non-empty-or-finish) and `pending_drained_cond` (queue-emptied).
    queue: Mutex<QueueState>,
    queue_cond: Condvar,
    pending_drained_cond: Condvar,

    /// Number of tasks currently being executed by workers. Incremented
    /// while the queue lock is still held, immediately after a dequeue, so
    /// a task is never counted as neither queued nor running.
    running: AtomicUsize,

    /// Exists solely to pair with `task_finished_cond`, the way a wait
    /// mutex pairs with a "no pending work" condvar: the notifier takes
    /// this lock around the notify so a waiter's check-then-wait on
    /// `running` can't race a lost wakeup.
    finished_wait: Mutex<()>,
    task_finished_cond: Condvar,
}

#[derive(Debug)]
struct QueueState {
    fifo: Fifo<Task>,
    finish: bool,
}

impl Pool {
    /// Creates a new pool with `size` worker threads, each blocked waiting
    /// for work.
    ///
    /// # Panics / process exit
    /// If a worker thread cannot be spawned (OS resource exhaustion), this
    /// is treated as fatal: already-spawned workers are signalled to exit
    /// and joined, the cause is logged, and the process exits with a
    /// non-zero status. The pool's invariants cannot be restored from a
    /// partially constructed state, so there is no recoverable error to
    /// return here.
    pub fn new(size: NonZeroUsize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState {
                fifo: Fifo::new(),
                finish: false,
            }),
            queue_cond: Condvar::new(),
            pending_drained_cond: Condvar::new(),
            running: AtomicUsize::new(0),
            finished_wait: Mutex::new(()),
            task_finished_cond: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(size.get());
        for worker_id in 0..size.get() {
            let worker_shared = Arc::clone(&shared);
            match thread::Builder::new()
                .name(format!("drain-pool-worker-{worker_id}"))
                .spawn(move || worker_shared.run_worker_loop(worker_id))
            {
                Ok(handle) => workers.push(handle),
                Err(cause) => {
                    log::error!("failed to spawn worker {worker_id}: {cause}");
                    shared.shut_down_for_fatal_construction_failure();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    std::process::exit(1);
                }
            }
        }

        Self {
            size,
            shared,
            destroyed: AtomicBool::new(false),
            workers: Mutex::new(Some(workers)),
        }
    }

    /// Returns the number of worker threads in the pool.
    pub fn n_workers(&self) -> NonZeroUsize {
        self.size
    }

    /// Submits a task for execution by the first available worker.
    ///
    /// # Errors
    /// Returns [`PoolError::Rejected`] if [`destroy`](Self::destroy) has
    /// already begun. No state changes in that case.
    pub fn submit<F>(&self, task: F) -> PoolResult
    where
        F: FnOnce() + Send + 'static,
    {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(PoolError::Rejected);
        }

        self.shared.enqueue(Task::new(task));
        Ok(())
    }

    /// Initiates (or, on a second or later call, no-ops) an orderly
    /// shutdown of the pool.
    ///
    /// If `drain_pending` is `true`, every task already in the queue is
    /// executed before the workers are told to exit. If `false`, any task
    /// still queued at this moment is discarded without running; only the
    /// task(s) already in flight are allowed to complete. Under neither
    /// mode is a running task interrupted — there is no cancellation
    /// primitive.
    ///
    /// Idempotent: the first call performs the real teardown; every call
    /// after that (concurrent or sequential) returns immediately.
    pub fn destroy(&self, drain_pending: bool) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            // Someone else already entered destroy; nothing left to do.
            return;
        }

        if drain_pending {
            self.shared.wait_until_queue_drained();
        }

        self.shared.signal_finish();
        self.shared.wait_until_no_tasks_running();

        let handles = self
            .workers
            .lock()
            .take()
            .expect("destroy cannot run twice");
        for handle in handles {
            if let Err(cause) = handle.join() {
                log::error!("worker thread panicked while joining: {cause:?}");
            }
        }

        // Only non-empty here if `drain_pending` was false: whatever is
        // left was never going to run.
        self.shared.queue.lock().fifo.clear();
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        // A pool that is simply dropped drains rather than discards: we'd
        // rather block a little longer than silently lose submitted work.
        self.destroy(true);
    }
}

impl Shared {
    fn enqueue(&self, task: Task) {
        {
            let mut state = self.queue.lock();
            state.fifo.enqueue(task);
        }
        self.queue_cond.notify_one();
    }

    fn run_worker_loop(&self, worker_id: usize) {
        log::trace!("worker {worker_id} started");

        while let Some(task) = self.fetch() {
            if let Err(cause) = panic::catch_unwind(panic::AssertUnwindSafe(|| task.run())) {
                log::error!("worker {worker_id} task panicked: {cause:?}");
            }
            self.account_task_finished();
        }

        log::trace!("worker {worker_id} exiting");
    }

    /// Blocks until there is a task to run or the pool is finishing.
    /// Returns `None` once `finish` is observed, which is this worker's
    /// cue to return from its loop (and thereby become joinable).
    fn fetch(&self) -> Option<Task> {
        let mut state = self.queue.lock();

        while !state.finish && state.fifo.is_empty() {
            self.queue_cond.wait(&mut state);
        }

        if state.finish {
            return None;
        }

        let task = state
            .fifo
            .dequeue()
            .expect("loop condition guarantees a task is present");

        // Incremented before the queue lock is released: the task is
        // always counted as either queued or running, never as neither.
        self.running.fetch_add(1, Ordering::AcqRel);

        Some(task)
    }

    fn account_task_finished(&self) {
        let previous = self.running.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "running count underflowed");

        {
            let _guard = self.finished_wait.lock();
            self.task_finished_cond.notify_all();
        }
        {
            let _guard = self.queue.lock();
            self.pending_drained_cond.notify_all();
        }
    }

    fn wait_until_queue_drained(&self) {
        let mut state = self.queue.lock();
        while !state.fifo.is_empty() {
            self.pending_drained_cond.wait(&mut state);
        }
    }

    /// Sets `finish` and wakes every worker sleeping on an empty queue.
    ///
    /// Holding the queue lock while setting `finish` and broadcasting is
    /// what makes this safe: every worker's check-then-wait on `finish`
    /// happens under the same lock, so there is no window in which a
    /// worker could observe `finish == false`, start waiting, and never be
    /// woken.
    fn signal_finish(&self) {
        let mut state = self.queue.lock();
        state.finish = true;
        self.queue_cond.notify_all();
    }

    fn wait_until_no_tasks_running(&self) {
        if self.running.load(Ordering::Acquire) == 0 {
            return;
        }

        let mut guard = self.finished_wait.lock();
        while self.running.load(Ordering::Acquire) != 0 {
            self.task_finished_cond.wait(&mut guard);
        }
    }

    /// Best-effort cleanup when a worker thread fails to spawn partway
    /// through construction: tell whichever workers did spawn to exit so
    /// the caller can join them before the process terminates.
    fn shut_down_for_fatal_construction_failure(&self) {
        self.signal_finish();
    }
}
