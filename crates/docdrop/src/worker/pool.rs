use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::error::WorkerError;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Backlog slots per worker.
pub const BACKLOG_PER_WORKER: usize = 3;

/// Where a submitted task ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// The backlog was full and the task already ran on the submitting thread.
    RanOnCaller,
}

/// A task handed back because the pool no longer accepts work.
pub struct Rejected(Task);

impl Rejected {
    pub fn into_task(self) -> Task {
        self.0
    }
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rejected(..)")
    }
}

/// Fixed set of worker threads behind a bounded FIFO backlog.
///
/// When the backlog is full `submit` runs the task on the calling thread,
/// which throttles whoever is producing work to the pool's throughput.
pub struct WorkerPool {
    sender: RwLock<Option<Sender<Task>>>,
    exit_receiver: Receiver<usize>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    exited: AtomicUsize,
    size: usize,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }

        let (sender, receiver) = bounded::<Task>(worker_count * BACKLOG_PER_WORKER);
        let (exit_sender, exit_receiver) = bounded::<usize>(worker_count);

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let task_rx = receiver.clone();
            let exit_tx = exit_sender.clone();

            let handle = thread::Builder::new()
                .name(format!("ldr-w-{}", worker_id))
                .spawn(move || run_worker(worker_id, task_rx, exit_tx))
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;
            workers.push(handle);
        }

        info!(
            "Started {} workers (backlog {})",
            worker_count,
            worker_count * BACKLOG_PER_WORKER
        );

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            exit_receiver,
            workers: Mutex::new(workers),
            exited: AtomicUsize::new(0),
            size: worker_count,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.size * BACKLOG_PER_WORKER
    }

    /// Queues `task`, or runs it right here if the backlog is full.
    ///
    /// Never blocks on a full backlog and never drops a task. After
    /// [`shutdown`](Self::shutdown) the task is handed back unexecuted.
    pub fn submit<F>(&self, task: F) -> Result<Submission, Rejected>
    where
        F: FnOnce() + Send + 'static,
    {
        let task: Task = Box::new(task);

        let guard = match self.sender.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let sender = match guard.as_ref() {
            Some(sender) => sender,
            None => return Err(Rejected(task)),
        };

        match sender.try_send(task) {
            Ok(()) => Ok(Submission::Queued),
            Err(TrySendError::Full(task)) => {
                drop(guard);
                debug!("Backlog full, running task on the submitting thread");
                run_task(task);
                Ok(Submission::RanOnCaller)
            }
            Err(TrySendError::Disconnected(task)) => Err(Rejected(task)),
        }
    }

    /// Stops accepting tasks. Queued and running tasks still finish.
    pub fn shutdown(&self) {
        let mut guard = match self.sender.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            info!("Shutting down worker pool...");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        match self.sender.read() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// Blocks until every worker has exited or `timeout` elapses.
    ///
    /// Returns `true` if the pool fully drained. Workers only exit after
    /// [`shutdown`](Self::shutdown), so calling this first just waits out
    /// the timeout.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while self.exited.load(Ordering::SeqCst) < self.size {
            match self.exit_receiver.recv_deadline(deadline) {
                Ok(worker_id) => {
                    debug!("Worker {} finished", worker_id);
                    self.exited.fetch_add(1, Ordering::SeqCst);
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "{} of {} workers still busy after {:?}",
                        self.size - self.exited.load(Ordering::SeqCst),
                        self.size,
                        timeout
                    );
                    return false;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let handles: Vec<JoinHandle<()>> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for (i, worker) in handles.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {}", i, panic_message(e.as_ref()));
            }
        }

        info!("All workers have stopped");
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Lets idle workers exit; busy ones are detached.
        self.shutdown();
    }
}

/// Reports a worker's exit even if its loop unwinds.
struct ExitNotice {
    worker_id: usize,
    sender: Sender<usize>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.sender.send(self.worker_id);
    }
}

fn run_worker(worker_id: usize, task_receiver: Receiver<Task>, exit_sender: Sender<usize>) {
    let _notice = ExitNotice {
        worker_id,
        sender: exit_sender,
    };
    debug!("Worker {} started", worker_id);

    // Ends once the pool drops its sender and the backlog is empty
    for task in task_receiver.iter() {
        run_task(task);
    }

    debug!("Worker {} job channel disconnected", worker_id);
}

fn run_task(task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        error!("Task panicked: {}", panic_message(payload.as_ref()));
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(WorkerError::SpawnFailed(_))
        ));
    }

    #[test]
    fn test_submit_and_drain() {
        let pool = WorkerPool::new(2).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let done = Arc::clone(&done);
            pool.submit(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_full_backlog_runs_on_caller() {
        let pool = WorkerPool::new(1).unwrap();
        assert_eq!(pool.capacity(), 3);

        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
        let ran_on = Arc::new(Mutex::new(Vec::new()));

        // Occupy the only worker until the gate opens
        pool.submit(move || {
            started_tx.send(()).unwrap();
            let _ = gate_rx.recv();
        })
        .unwrap();
        started_rx.recv().unwrap();

        let mut submissions = Vec::new();
        for _ in 0..4 {
            let ran_on = Arc::clone(&ran_on);
            submissions.push(
                pool.submit(move || {
                    ran_on.lock().unwrap().push(thread::current().id());
                })
                .unwrap(),
            );
        }

        assert_eq!(
            submissions,
            vec![
                Submission::Queued,
                Submission::Queued,
                Submission::Queued,
                Submission::RanOnCaller
            ]
        );
        assert_eq!(ran_on.lock().unwrap().as_slice(), &[thread::current().id()]);

        drop(gate_tx);
        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert_eq!(ran_on.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        pool.submit(|| panic!("boom")).unwrap();
        let counter = Arc::clone(&done);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_submit_after_shutdown_hands_task_back() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        assert!(pool.is_shutdown());

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let rejected = pool
            .submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap_err();

        (rejected.into_task())();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(pool.await_termination(Duration::from_secs(5)));
    }

    #[test]
    fn test_await_termination_times_out_while_busy() {
        let pool = WorkerPool::new(1).unwrap();
        let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);

        pool.submit(move || {
            let _ = gate_rx.recv();
        })
        .unwrap();
        pool.shutdown();

        assert!(!pool.await_termination(Duration::from_millis(50)));

        drop(gate_tx);
        assert!(pool.await_termination(Duration::from_secs(5)));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
