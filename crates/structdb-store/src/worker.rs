//! Single background worker with a FIFO task queue.
//!
//! Tasks run one at a time, in submission order, on one dedicated thread.
//! The thread is spawned lazily by the first [`Worker::submit`] and then
//! sleeps on a condition variable whenever the queue is empty.
//!
//! Shutdown (explicit or on drop) lets the task currently running finish,
//! discards every queued task without running it, and joins the thread.
//! Discarded tasks are dropped, not called.
//!
//! ```text
//! Idle ──submit──▶ Running ──shutdown──▶ Draining ──join──▶ Stopped
//!   └──────────────────shutdown──────────────────────────────▲
//! ```

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Condvar, Mutex};
use structdb_settings::WorkerSettings;
use tracing::{debug, error};

use crate::errors::{Result, StoreError};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of a [`Worker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// No thread spawned yet.
    Idle,
    /// Thread serving the queue.
    Running,
    /// Shutdown requested; the current task is finishing.
    Draining,
    /// Thread gone; no further tasks accepted.
    Stopped,
}

struct Queue {
    tasks: VecDeque<Task>,
    abort: bool,
    state: WorkerState,
    thread: Option<ThreadId>,
}

struct Shared {
    queue: Mutex<Queue>,
    wake: Condvar,
}

/// A serialized task executor backed by one OS thread.
pub struct Worker {
    name: String,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Create an idle worker whose thread will be called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    tasks: VecDeque::new(),
                    abort: false,
                    state: WorkerState::Idle,
                    thread: None,
                }),
                wake: Condvar::new(),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Create an idle worker from settings.
    pub fn from_settings(settings: &WorkerSettings) -> Self {
        Self::new(settings.thread_name.clone())
    }

    /// Thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.shared.queue.lock().state
    }

    /// Tasks waiting to run (excluding one currently running).
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    /// Enqueue a task. Never blocks on running tasks.
    ///
    /// Starts the worker thread on first use. Fails with
    /// [`StoreError::WorkerStopped`] once shutdown has begun.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        match queue.state {
            WorkerState::Draining | WorkerState::Stopped => Err(StoreError::WorkerStopped),
            WorkerState::Idle => {
                let shared = Arc::clone(&self.shared);
                let handle = thread::Builder::new()
                    .name(self.name.clone())
                    .spawn(move || run(&shared))
                    .map_err(StoreError::Spawn)?;
                queue.thread = Some(handle.thread().id());
                *self.handle.lock() = Some(handle);
                queue.tasks.push_back(Box::new(task));
                queue.state = WorkerState::Running;
                debug!(worker = %self.name, "worker started");
                Ok(())
            }
            WorkerState::Running => {
                queue.tasks.push_back(Box::new(task));
                let _ = self.shared.wake.notify_one();
                Ok(())
            }
        }
    }

    /// Stop the worker: finish the running task, discard queued ones, and
    /// join the thread. Idempotent.
    ///
    /// Concurrent callers all return only after the thread has been joined.
    /// Called from a task on this worker, it does not wait for itself; the
    /// thread exits once that task returns.
    pub fn shutdown(&self) {
        let (discarded, on_worker): (Vec<Task>, bool) = {
            let mut queue = self.shared.queue.lock();
            if queue.state == WorkerState::Stopped {
                return;
            }
            queue.abort = true;
            queue.state = match queue.state {
                WorkerState::Running | WorkerState::Draining => WorkerState::Draining,
                WorkerState::Idle | WorkerState::Stopped => WorkerState::Stopped,
            };
            let on_worker = queue.thread == Some(thread::current().id());
            (queue.tasks.drain(..).collect(), on_worker)
        };
        let _ = self.shared.wake.notify_all();
        if !discarded.is_empty() {
            debug!(worker = %self.name, discarded = discarded.len(), "discarded queued tasks");
        }
        drop(discarded);

        if on_worker {
            debug!(worker = %self.name, "shutdown from worker thread, not joining");
            self.shared.queue.lock().state = WorkerState::Stopped;
            return;
        }

        // Held across the join so a concurrent caller waits for it.
        let mut handle = self.handle.lock();
        if let Some(handle) = handle.take()
            && handle.join().is_err()
        {
            error!(worker = %self.name, "worker thread panicked");
        }
        self.shared.queue.lock().state = WorkerState::Stopped;
        debug!(worker = %self.name, "worker stopped");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

fn run(shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.abort {
                    return;
                }
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                shared.wake.wait(&mut queue);
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!("worker task panicked");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;

    use assert_matches::assert_matches;

    use super::*;

    fn wait_idle(worker: &Worker) {
        let (tx, rx) = mpsc::channel();
        worker.submit(move || tx.send(()).unwrap()).unwrap();
        rx.recv().unwrap();
    }

    #[test]
    fn starts_lazily() {
        let worker = Worker::new("t-lazy");
        assert_eq!(worker.state(), WorkerState::Idle);
        wait_idle(&worker);
        assert_eq!(worker.state(), WorkerState::Running);
    }

    #[test]
    fn runs_on_named_thread() {
        let worker = Worker::new("t-named");
        let (tx, rx) = mpsc::channel();
        worker
            .submit(move || tx.send(thread::current().name().map(String::from)).unwrap())
            .unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("t-named"));
    }

    #[test]
    fn preserves_submission_order() {
        let worker = Worker::new("t-order");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let s = Arc::clone(&seen);
        worker
            .submit(move || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                s.lock().push('A');
            })
            .unwrap();
        started_rx.recv().unwrap();

        for label in ['B', 'C'] {
            let s = Arc::clone(&seen);
            worker.submit(move || s.lock().push(label)).unwrap();
        }
        release_tx.send(()).unwrap();
        wait_idle(&worker);

        assert_eq!(*seen.lock(), ['A', 'B', 'C']);
    }

    #[test]
    fn shutdown_discards_queued_tasks() {
        let worker = Worker::new("t-discard");
        let ran = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let f = Arc::clone(&finished);
        worker
            .submit(move || {
                started_tx.send(()).unwrap();
                // Unblocks when the queued task below is dropped.
                let _ = release_rx.recv();
                f.store(true, Ordering::SeqCst);
            })
            .unwrap();
        started_rx.recv().unwrap();

        let r = Arc::clone(&ran);
        worker
            .submit(move || {
                let _keep = release_tx;
                r.store(true, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(worker.pending(), 1);

        worker.shutdown();
        assert!(finished.load(Ordering::SeqCst));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let worker = Worker::new("t-stopped");
        worker.shutdown();
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_matches!(worker.submit(|| {}), Err(StoreError::WorkerStopped));
        worker.shutdown();
    }

    #[test]
    fn panicking_task_does_not_stop_worker() {
        let worker = Worker::new("t-panic");
        worker.submit(|| panic!("boom")).unwrap();
        wait_idle(&worker);
        assert_eq!(worker.state(), WorkerState::Running);
    }

    #[test]
    fn shutdown_from_own_task_does_not_deadlock() {
        let worker = Arc::new(Worker::new("t-self"));
        let (tx, rx) = mpsc::channel();
        let w = Arc::clone(&worker);
        worker
            .submit(move || {
                w.shutdown();
                tx.send(w.state()).unwrap();
            })
            .unwrap();
        assert_eq!(rx.recv().unwrap(), WorkerState::Stopped);
    }

    #[test]
    fn concurrent_shutdown_waits_for_join() {
        let worker = Arc::new(Worker::new("t-concurrent"));
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let f = Arc::clone(&finished);
        worker
            .submit(move || {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
                f.store(true, Ordering::SeqCst);
            })
            .unwrap();
        started_rx.recv().unwrap();

        let first = {
            let worker = Arc::clone(&worker);
            thread::spawn(move || worker.shutdown())
        };
        while worker.state() != WorkerState::Draining {
            thread::yield_now();
        }
        let second = {
            let worker = Arc::clone(&worker);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                worker.shutdown();
                (finished.load(Ordering::SeqCst), worker.state())
            })
        };
        thread::sleep(std::time::Duration::from_millis(50));
        release_tx.send(()).unwrap();

        assert_eq!(second.join().unwrap(), (true, WorkerState::Stopped));
        first.join().unwrap();
    }

    #[test]
    fn drop_joins_thread() {
        let finished = Arc::new(AtomicBool::new(false));
        {
            let worker = Worker::new("t-drop");
            let f = Arc::clone(&finished);
            worker
                .submit(move || {
                    thread::sleep(std::time::Duration::from_millis(20));
                    f.store(true, Ordering::SeqCst);
                })
                .unwrap();
            // The task may or may not have been dequeued yet; wait until it has.
            while worker.pending() > 0 {
                thread::yield_now();
            }
        }
        assert!(finished.load(Ordering::SeqCst));
    }
}
