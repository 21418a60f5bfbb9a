//! Pipeline lifecycle: wiring, run modes and explicit shutdown.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{Config, RunMode};
use crate::error::{DocdropError, WorkerError};
use crate::pipeline::{FileLoader, LoadSummary};
use crate::staging::StagedFile;
use crate::store::{self, DocumentStore};
use crate::worker::{CancellationToken, DirectoryWatcher, Submission, WorkerPool};

/// Owns the worker pool and the watcher for the life of a run.
///
/// `run` blocks the calling thread. Another thread stops a watch run with
/// [`CancellationToken::cancel`] on the token from
/// [`cancellation_token`](Self::cancellation_token); `run` then drains the
/// pool before returning.
pub struct Controller {
    mode: RunMode,
    recover: bool,
    shutdown_timeout: Duration,
    loader: Arc<FileLoader>,
    pool: WorkerPool,
    watcher: DirectoryWatcher,
    token: CancellationToken,
    // True while `run` may still claim and dispatch files
    discovering: Mutex<bool>,
    discovery_done: Condvar,
    drained: Mutex<Option<bool>>,
}

/// Marks discovery as finished when `run` leaves its discovery phase,
/// including by unwinding.
struct DiscoveryGuard<'a> {
    controller: &'a Controller,
}

impl Drop for DiscoveryGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.controller.discovering) = false;
        self.controller.discovery_done.notify_all();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Controller {
    /// Prepares the four directories and starts the workers.
    pub fn new(config: &Config, store: Arc<dyn DocumentStore>) -> Result<Self, DocdropError> {
        let dirs = config.directories.stage_dirs();
        dirs.ensure()?;

        let pool = WorkerPool::new(config.write.concurrency)?;
        let watcher = DirectoryWatcher::new(dirs, config.input.extension.clone())
            .with_intervals(config.watch.poll_interval(), config.watch.debounce());

        Ok(Self {
            mode: config.mode,
            recover: config.recover_processing,
            shutdown_timeout: config.shutdown_timeout(),
            loader: Arc::new(FileLoader::from_config(config, store)),
            pool,
            watcher,
            token: CancellationToken::new(),
            discovering: Mutex::new(false),
            discovery_done: Condvar::new(),
            drained: Mutex::new(None),
        })
    }

    /// Like [`new`](Self::new), building the store the config names.
    pub fn from_config(config: &Config) -> Result<Self, DocdropError> {
        let store = store::from_config(&config.store, config.write.concurrency)?;
        Self::new(config, store)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn summary(&self) -> LoadSummary {
        self.loader.stats().snapshot()
    }

    /// Runs until staging is drained (batch) or the token is cancelled
    /// (watch), then shuts the pool down and waits for in-flight tasks.
    ///
    /// Fails with [`WorkerError::DrainTimeout`] if tasks are still running
    /// after the configured shutdown timeout.
    pub fn run(&self) -> Result<LoadSummary, DocdropError> {
        info!(mode = ?self.mode, workers = self.pool.size(), "Starting pipeline");

        let discovered = {
            *lock(&self.discovering) = true;
            let _discovery = DiscoveryGuard { controller: self };

            self.recover_processing().and_then(|_| match self.mode {
                RunMode::Batch => self
                    .watcher
                    .drain(&mut |file: StagedFile| self.dispatch(file), &self.token)
                    .map(|claimed| debug!(claimed, "Staging drained")),
                RunMode::Watch => self
                    .watcher
                    .start_watching(|file: StagedFile| self.dispatch(file), &self.token),
            })
        };

        let drained = self.shutdown();
        discovered?;

        let summary = self.summary();
        if !drained {
            warn!("Shutdown timed out; {}", summary);
            return Err(WorkerError::DrainTimeout(self.shutdown_timeout).into());
        }

        info!("Pipeline finished: {}", summary);
        Ok(summary)
    }

    /// Stops discovery, waits for `run` to stop claiming files, then stops
    /// accepting tasks and waits for queued and running ones. All of it
    /// shares one shutdown timeout. Returns `true` if everything finished.
    ///
    /// Safe to call more than once and from any thread; later calls report
    /// the first result without waiting again.
    pub fn shutdown(&self) -> bool {
        self.token.cancel();

        let mut drained = lock(&self.drained);
        if let Some(done) = *drained {
            return done;
        }

        let deadline = Instant::now() + self.shutdown_timeout;
        let discovery_stopped = {
            let discovering = lock(&self.discovering);
            let (discovering, _) = match self
                .discovery_done
                .wait_timeout_while(discovering, self.shutdown_timeout, |active| *active)
            {
                Ok(result) => result,
                Err(poisoned) => poisoned.into_inner(),
            };
            !*discovering
        };

        self.pool.shutdown();
        let done = if discovery_stopped {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.pool.await_termination(remaining)
        } else {
            warn!("Discovery still running after {:?}", self.shutdown_timeout);
            false
        };

        *drained = Some(done);
        done
    }

    fn recover_processing(&self) -> Result<(), WorkerError> {
        let stuck = self.watcher.recover_processing()?;
        if stuck.is_empty() {
            return Ok(());
        }

        if !self.recover {
            warn!(
                count = stuck.len(),
                "Files left in processing by an earlier run; enable recover_processing to reload them"
            );
            return Ok(());
        }

        info!(count = stuck.len(), "Recovering files left in processing");
        for file in stuck {
            if self.token.is_cancelled() {
                break;
            }
            self.dispatch(file);
        }
        Ok(())
    }

    fn dispatch(&self, file: StagedFile) {
        let loader = Arc::clone(&self.loader);
        match self.pool.submit(move || {
            loader.load(file);
        }) {
            Ok(Submission::Queued) => {}
            Ok(Submission::RanOnCaller) => debug!("Pool saturated, task ran on the caller"),
            Err(rejected) => {
                // The file is already claimed, so it still has to leave processing
                warn!("Pool is shut down, running task inline");
                (rejected.into_task())();
            }
        }
    }
}
