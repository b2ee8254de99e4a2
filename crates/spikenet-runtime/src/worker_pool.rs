//! Fixed-size worker pool that executes submitted delivery tasks in
//! parallel (§4.1, C1).
//!
//! Grounded in the worker-thread pattern used by the pack's `feagi-pns`
//! transports crate (`blocking::worker::WorkerThread`): named threads
//! pulling from a shared `crossbeam::channel`, joined on shutdown. This
//! pool generalizes that single-consumer pattern to `n_workers` threads
//! sharing one multi-consumer receiver, since delivery tasks here are
//! independent and unordered (§4.1: "Ordering: none").

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of a single submitted task, delivered through a [`TaskHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task ran to completion.
    Completed,
    /// The task panicked; the panic message, if recoverable as a string.
    Panicked(String),
}

/// A completion handle returned by [`WorkerPool::enqueue`]. Dropping it
/// without calling [`TaskHandle::wait`] is fine — the task still runs to
/// completion on its worker thread; the handle only reports the outcome.
pub struct TaskHandle {
    receiver: channel::Receiver<TaskOutcome>,
}

impl TaskHandle {
    /// Block until the task completes, returning its outcome. Returns
    /// `None` if the pool was dropped mid-task without the outcome
    /// channel being signalled (the task itself was dropped unrun).
    pub fn wait(&self) -> Option<TaskOutcome> {
        self.receiver.recv().ok()
    }
}

/// A fixed set of worker threads draining one shared task queue.
///
/// `enqueue` is safe to call from any number of producer threads
/// concurrently — `crossbeam::channel::Sender` is itself `Clone + Sync`.
/// Dropping the pool (or calling [`WorkerPool::shutdown`]) closes the
/// queue: no further tasks are accepted, but every task already enqueued
/// is allowed to run to completion before the worker threads exit.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n_workers` worker threads sharing one task queue.
    pub fn new(n_workers: usize) -> Self {
        assert!(n_workers > 0, "worker pool needs at least one worker");
        let (sender, receiver) = channel::unbounded::<Job>();
        let handles = (0..n_workers)
            .map(|i| Self::spawn_worker(i, receiver.clone()))
            .collect();
        Self {
            sender: Some(sender),
            handles,
        }
    }

    fn spawn_worker(index: usize, receiver: Receiver<Job>) -> JoinHandle<()> {
        thread::Builder::new()
            .name(format!("spikenet-worker-{index}"))
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
                log::debug!("worker {index} exiting: task queue closed");
            })
            .expect("failed to spawn spikenet worker thread")
    }

    /// Hand ownership of a nullary task to the pool. Returns a handle that
    /// completes when the task has run (successfully or via a contained
    /// panic). Submitting after [`Self::shutdown`] is a caller error
    /// reported through the returned handle rather than a panic: the
    /// handle's channel is immediately closed and `wait()` returns `None`.
    pub fn enqueue<F>(&self, task: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let (outcome_tx, outcome_rx) = channel::bounded(1);
        let Some(sender) = &self.sender else {
            drop(outcome_tx);
            return TaskHandle { receiver: outcome_rx };
        };

        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(task));
            let outcome = match result {
                Ok(()) => TaskOutcome::Completed,
                Err(payload) => {
                    let reason = panic_message(&payload);
                    log::error!("worker task panicked: {reason}");
                    TaskOutcome::Panicked(reason)
                }
            };
            let _ = outcome_tx.send(outcome);
        });

        if sender.send(job).is_err() {
            log::warn!("enqueue called on a worker pool with a closed task queue");
        }
        TaskHandle { receiver: outcome_rx }
    }

    /// Stop accepting new tasks, then block until every worker thread has
    /// drained the queue and exited. Idempotent: calling twice is a no-op
    /// the second time.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.join() {
                log::error!("spikenet worker thread panicked during shutdown: {}", panic_message(&err));
            }
        }
    }

    /// Number of worker threads in this pool.
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Convenience alias used throughout the runtime crate; the scheduler and
/// propagator share one pool behind an `Arc`.
pub type SharedWorkerPool = Arc<WorkerPool>;
