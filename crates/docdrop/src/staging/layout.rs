use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::StagingError;
use crate::sanitize::filename_component;
use crate::writer::FailureCode;

/// Separates the original file name from the claim token in `processing/`.
pub const PROCESSING_MARKER: &str = "_processing_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDirs {
    pub staging: PathBuf,
    pub processing: PathBuf,
    pub completed: PathBuf,
    pub failed: PathBuf,
}

impl StageDirs {
    pub fn new<P: AsRef<Path>>(staging: P, processing: P, completed: P, failed: P) -> Self {
        Self {
            staging: staging.as_ref().to_path_buf(),
            processing: processing.as_ref().to_path_buf(),
            completed: completed.as_ref().to_path_buf(),
            failed: failed.as_ref().to_path_buf(),
        }
    }

    /// The conventional layout: four sibling directories under `root`.
    pub fn under<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self::new(
            root.join("staging"),
            root.join("processing"),
            root.join("completed"),
            root.join("failed"),
        )
    }

    /// Creates any missing directory, checks each one can be listed and
    /// written, and checks a file can be renamed along every path a staged
    /// file takes. Leaves no files behind.
    pub fn ensure(&self) -> Result<(), StagingError> {
        for dir in [
            &self.staging,
            &self.processing,
            &self.completed,
            &self.failed,
        ] {
            ensure_directory(dir)?;
        }
        self.check_renames()
    }

    /// Walks a scratch file staging -> processing -> completed -> failed.
    /// A rename fails across filesystems, so this rejects a layout where a
    /// stage change could not be atomic.
    fn check_renames(&self) -> Result<(), StagingError> {
        let name = scratch_name();
        let mut from = &self.staging;
        let mut current = from.join(&name);
        create_scratch(from, &current)?;

        for to in [&self.processing, &self.completed, &self.failed] {
            let next = to.join(&name);
            if let Err(e) = std::fs::rename(&current, &next) {
                remove_scratch(&current);
                return Err(StagingError::RenameUnsupported {
                    from: from.clone(),
                    to: to.clone(),
                    source: e,
                });
            }
            from = to;
            current = next;
        }

        remove_scratch(&current);
        Ok(())
    }
}

fn scratch_name() -> String {
    format!(".docdrop-check-{}", Uuid::new_v4().simple())
}

fn create_scratch(dir: &Path, path: &Path) -> Result<(), StagingError> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(drop)
        .map_err(|e| StagingError::NotWritable {
            path: dir.to_path_buf(),
            source: e,
        })
}

fn remove_scratch(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!("Failed to remove {}: {}", path.display(), e);
    }
}

fn ensure_directory(path: &Path) -> Result<(), StagingError> {
    if !path.exists() {
        tracing::info!("Creating directory {}", path.display());
        std::fs::create_dir_all(path).map_err(|e| StagingError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let metadata = std::fs::metadata(path).map_err(|e| StagingError::Inspect {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !metadata.is_dir() {
        return Err(StagingError::NotADirectory(path.to_path_buf()));
    }
    std::fs::read_dir(path).map_err(|e| StagingError::Inspect {
        path: path.to_path_buf(),
        source: e,
    })?;

    let scratch = path.join(scratch_name());
    create_scratch(path, &scratch)?;
    remove_scratch(&scratch);
    Ok(())
}

/// `<original-name>_processing_<token>`
pub fn processing_name(original_name: &str, token: &Uuid) -> String {
    format!("{}{}{}", original_name, PROCESSING_MARKER, token)
}

/// `<original-base>__ID-<id>__REV-<revision>__UUID-<token>`
pub fn completed_name(original_name: &str, id: &str, revision: &str, token: &Uuid) -> String {
    format!(
        "{}__ID-{}__REV-{}__UUID-{}",
        original_name,
        filename_component(id),
        filename_component(revision),
        token
    )
}

/// `<original-base>__CODE-<failureCode>__UUID-<token>`
pub fn failed_name(original_name: &str, code: FailureCode, token: &Uuid) -> String {
    format!("{}__CODE-{}__UUID-{}", original_name, code, token)
}
