use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, error, info, warn};
use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer_opt, Config as DebouncerConfig, DebouncedEventKind};
use walkdir::WalkDir;

use crate::error::{StagingError, WorkerError};
use crate::staging::{StageDirs, StagedFile};
use crate::worker::shutdown::CancellationToken;

const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Discovers files in `staging/` and claims each into `processing/`.
pub struct DirectoryWatcher {
    dirs: StageDirs,
    extension: Option<String>,
    poll_interval: Duration,
    debounce: Duration,
}

impl DirectoryWatcher {
    /// `extension` filters staged files by extension (case-insensitive,
    /// without the dot); `None` accepts every file.
    pub fn new(dirs: StageDirs, extension: Option<String>) -> Self {
        Self {
            dirs,
            extension: extension.map(|e| e.trim_start_matches('.').to_ascii_lowercase()),
            poll_interval: Duration::from_secs(2),
            debounce: Duration::from_millis(500),
        }
    }

    pub fn with_intervals(mut self, poll_interval: Duration, debounce: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.debounce = debounce;
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        match &self.extension {
            None => true,
            Some(wanted) => path
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(wanted))
                .unwrap_or(false),
        }
    }

    /// Claims one staged file. A failed rename (vanished file, permissions,
    /// a concurrent claimant) is logged and yields `None`.
    pub fn claim(&self, path: &Path) -> Option<StagedFile> {
        match StagedFile::claim(path, &self.dirs) {
            Ok(file) => {
                debug!("Claimed {} as {}", path.display(), file.path().display());
                Some(file)
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Lists the matching files currently in `staging/`, sorted by name.
    pub fn scan(&self) -> Result<Vec<PathBuf>, WorkerError> {
        let files = list_files(&self.dirs.staging)?
            .into_iter()
            .filter(|path| self.accepts(path))
            .collect::<Vec<_>>();

        info!(
            "Scanned {} documents in {}",
            files.len(),
            self.dirs.staging.display()
        );
        Ok(files)
    }

    /// Claims every file currently staged and hands each to `on_claim`.
    /// Stops claiming once `token` is cancelled; unclaimed files stay in
    /// `staging/`. Returns how many files were claimed.
    pub fn drain<F>(&self, on_claim: &mut F, token: &CancellationToken) -> Result<usize, WorkerError>
    where
        F: FnMut(StagedFile),
    {
        let mut claimed = 0;
        for path in self.scan()? {
            if token.is_cancelled() {
                info!("Drain cancelled after {} files", claimed);
                break;
            }
            if let Some(file) = self.claim(&path) {
                on_claim(file);
                claimed += 1;
            }
        }
        Ok(claimed)
    }

    /// Blocks the calling thread: claims every pre-existing staged file,
    /// then every file that shows up later, until `token` is cancelled.
    ///
    /// The watch is registered before the initial drain so files dropped
    /// during the drain are not missed.
    pub fn start_watching<F>(&self, mut on_claim: F, token: &CancellationToken) -> Result<(), WorkerError>
    where
        F: FnMut(StagedFile),
    {
        // PollWatcher for Docker/NFS compatibility
        let poll_config = NotifyConfig::default().with_poll_interval(self.poll_interval);
        let debouncer_config = DebouncerConfig::default()
            .with_timeout(self.debounce)
            .with_notify_config(poll_config);

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&self.dirs.staging, RecursiveMode::NonRecursive)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        info!("Watching directory: {}", self.dirs.staging.display());

        let initial = self.drain(&mut on_claim, token)?;
        debug!("Initial drain claimed {} files", initial);

        loop {
            if token.is_cancelled() {
                info!("Watch mode shutting down...");
                break;
            }

            match rx.recv_timeout(CANCEL_CHECK_INTERVAL) {
                Ok(Ok(events)) => {
                    for event in events {
                        if token.is_cancelled() {
                            break;
                        }
                        if !matches!(event.kind, DebouncedEventKind::Any) {
                            continue;
                        }
                        let path = &event.path;
                        // Removals and our own claims show up as events too
                        if !path.exists() || !self.accepts(path) {
                            continue;
                        }
                        info!("New document detected: {}", path.display());
                        if let Some(file) = self.claim(path) {
                            on_claim(file);
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("Watch error: {:?}", e);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    error!("Watch channel disconnected");
                    return Err(WorkerError::WatchError(
                        "watch channel disconnected".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Adopts files left in `processing/` by an earlier run. Entries without
    /// a processing marker are logged and left alone.
    pub fn recover_processing(&self) -> Result<Vec<StagedFile>, WorkerError> {
        let mut recovered = Vec::new();
        for path in list_files(&self.dirs.processing)? {
            match StagedFile::from_processing(path) {
                Ok(file) => recovered.push(file),
                Err(StagingError::NotProcessing(path)) => {
                    warn!("Ignoring unrecognised file in processing: {}", path.display());
                }
                Err(e) => warn!("Ignoring file in processing: {}", e),
            }
        }
        Ok(recovered)
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, WorkerError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) if e.depth() == 0 => {
                return Err(WorkerError::ScanFailed {
                    path: dir.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => warn!("Skipping unreadable entry in {}: {}", dir.display(), e),
        }
    }
    Ok(files)
}
