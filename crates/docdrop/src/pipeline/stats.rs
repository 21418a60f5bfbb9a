use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::runner::LoadResult;
use crate::staging::Stage;
use crate::writer::WriteOutcome;

/// Running totals across every File Load Task of a pipeline.
#[derive(Debug, Default)]
pub struct LoadStats {
    inserted: AtomicUsize,
    updated: AtomicUsize,
    conflict_resolved: AtomicUsize,
    failed: AtomicUsize,
    relocation_failed: AtomicUsize,
}

impl LoadStats {
    pub fn record(&self, result: &LoadResult) {
        let counter = match result.outcome {
            WriteOutcome::Inserted { .. } => &self.inserted,
            WriteOutcome::Updated { .. } => &self.updated,
            WriteOutcome::ConflictResolved { .. } => &self.conflict_resolved,
            WriteOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if result.stage == Stage::Processing {
            self.relocation_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> LoadSummary {
        LoadSummary {
            inserted: self.inserted.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            conflict_resolved: self.conflict_resolved.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            relocation_failed: self.relocation_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    pub updated: usize,
    pub conflict_resolved: usize,
    pub failed: usize,
    /// Files whose outcome is known but that are still in `processing/`.
    pub relocation_failed: usize,
}

impl LoadSummary {
    pub fn succeeded(&self) -> usize {
        self.inserted + self.updated + self.conflict_resolved
    }

    pub fn total(&self) -> usize {
        self.succeeded() + self.failed
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} inserted, {} updated, {} conflicts resolved, {} failed",
            self.total(),
            self.inserted,
            self.updated,
            self.conflict_resolved,
            self.failed
        )?;
        if self.relocation_failed > 0 {
            write!(f, " ({} left in processing)", self.relocation_failed)?;
        }
        Ok(())
    }
}
