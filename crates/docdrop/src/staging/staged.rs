use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use super::layout::{processing_name, StageDirs, PROCESSING_MARKER};
use crate::error::StagingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Staging,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Staging => "staging",
            Stage::Processing => "processing",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A physical file in flight, owned by exactly one component at a time.
///
/// Every stage change is a rename that consumes the value and hands back the
/// file at its new location, so a stale handle to a previous location cannot
/// be used.
#[derive(Debug)]
pub struct StagedFile {
    original_name: String,
    path: PathBuf,
    stage: Stage,
}

impl StagedFile {
    /// Atomically renames `staging_path` into `dirs.processing` under a
    /// fresh unique name.
    ///
    /// Whoever wins this rename owns the file; a concurrent claimant gets
    /// [`StagingError::MoveFile`] because the source no longer exists.
    pub fn claim(staging_path: &Path, dirs: &StageDirs) -> Result<Self, StagingError> {
        let original_name = file_name(staging_path)?;
        let target = dirs
            .processing
            .join(processing_name(&original_name, &Uuid::new_v4()));

        debug!(
            "Moving to processing {} --> {}",
            staging_path.display(),
            target.display()
        );
        std::fs::rename(staging_path, &target).map_err(|e| StagingError::MoveFile {
            from: staging_path.to_path_buf(),
            to: target.clone(),
            source: e,
        })?;

        Ok(Self {
            original_name,
            path: target,
            stage: Stage::Processing,
        })
    }

    /// Adopts a file that is already in `processing/`, e.g. one left behind
    /// by an earlier run. The original name is the text before the last
    /// processing marker.
    pub fn from_processing(path: PathBuf) -> Result<Self, StagingError> {
        let name = file_name(&path)?;
        let original_name = match name.rfind(PROCESSING_MARKER) {
            Some(idx) if idx > 0 => name[..idx].to_string(),
            _ => return Err(StagingError::NotProcessing(path)),
        };

        Ok(Self {
            original_name,
            path,
            stage: Stage::Processing,
        })
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Moves the file to `destination` by atomic rename, replacing any file
    /// already there. On failure the file is still where it was and nothing
    /// is written at `destination`.
    pub fn relocate(self, destination: PathBuf, stage: Stage) -> Result<Self, StagingError> {
        debug!(
            "move - {} --> {}",
            self.path.display(),
            destination.display()
        );
        move_file(&self.path, &destination)?;

        Ok(Self {
            original_name: self.original_name,
            path: destination,
            stage,
        })
    }
}

fn file_name(path: &Path) -> Result<String, StagingError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| StagingError::InvalidName(path.to_path_buf()))
}

fn move_file(src: &Path, dst: &Path) -> Result<(), StagingError> {
    std::fs::rename(src, dst).map_err(|e| StagingError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })
}
