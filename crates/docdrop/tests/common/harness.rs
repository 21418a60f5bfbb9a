//! Isolated filesystem layout for pipeline tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use docdrop::{Config, Controller, InMemoryStore, StageDirs};

use super::builders::ConfigBuilder;

pub struct TestHarness {
    /// Keeps the directories alive for the test's duration.
    temp_dir: TempDir,
    pub dirs: StageDirs,
    pub store: Arc<InMemoryStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dirs = StageDirs::under(temp_dir.path());
        dirs.ensure().expect("Failed to create stage directories");

        Self {
            temp_dir,
            dirs,
            store: Arc::new(InMemoryStore::new()),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> ConfigBuilder {
        ConfigBuilder::new(&self.dirs)
    }

    /// A controller writing into this harness's in-memory store.
    pub fn controller(&self, config: &Config) -> Controller {
        Controller::new(config, self.store.clone()).expect("Failed to build controller")
    }

    /// Drops a file into staging.
    pub fn stage(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dirs.staging.join(name);
        std::fs::write(&path, content).expect("Failed to write staged file");
        path
    }

    /// Copies a fixture from `tests/fixtures/` into staging.
    pub fn stage_fixture(&self, fixture: &str) -> PathBuf {
        let source = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(fixture);
        let target = self.dirs.staging.join(fixture);
        std::fs::copy(&source, &target).expect("Failed to copy fixture");
        target
    }

    pub fn staging(&self) -> Vec<String> {
        list(&self.dirs.staging)
    }

    pub fn processing(&self) -> Vec<String> {
        list(&self.dirs.processing)
    }

    pub fn completed(&self) -> Vec<String> {
        list(&self.dirs.completed)
    }

    pub fn failed(&self) -> Vec<String> {
        list(&self.dirs.failed)
    }

    /// Polls until `completed/` and `failed/` together hold `count` files.
    pub fn wait_for_terminal(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.completed().len() + self.failed().len() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(25));
        }
        false
    }
}

fn list(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read directory")
        .map(|entry| {
            entry
                .expect("Failed to read entry")
                .file_name()
                .to_string_lossy()
                .to_string()
        })
        .collect();
    names.sort();
    names
}
