use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::{Config, IdSource};
use crate::document::{resolve_id, ContentDecoder, Document, ID_FIELD};
use crate::error::DecodeError;
use crate::sanitize;
use crate::staging::{completed_name, failed_name, Stage, StageDirs, StagedFile};
use crate::store::DocumentStore;
use crate::worker::pool::panic_message;
use crate::writer::{FailureCode, Upserter, WriteOutcome};

use super::context::{LoadContext, LoadState};
use super::error::LoadError;
use super::stats::LoadStats;

/// What happened to one staged file.
#[derive(Debug)]
pub struct LoadResult {
    pub original_name: String,
    pub outcome: WriteOutcome,
    /// Where the file rests now.
    pub path: PathBuf,
    /// `Completed` or `Failed`; `Processing` only if the final move failed.
    pub stage: Stage,
}

/// Executes File Load Tasks: decode, resolve id, upsert, relocate.
pub struct FileLoader {
    dirs: StageDirs,
    decoder: Box<dyn ContentDecoder>,
    id_source: IdSource,
    upserter: Upserter,
    stats: Arc<LoadStats>,
}

impl FileLoader {
    pub fn new(
        dirs: StageDirs,
        decoder: Box<dyn ContentDecoder>,
        id_source: IdSource,
        upserter: Upserter,
    ) -> Self {
        Self {
            dirs,
            decoder,
            id_source,
            upserter,
            stats: Arc::new(LoadStats::default()),
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        Self::new(
            config.directories.stage_dirs(),
            config.input.format.decoder(),
            config.write.id_source.clone(),
            Upserter::new(store, config.write.merge_policy),
        )
    }

    pub fn stats(&self) -> &Arc<LoadStats> {
        &self.stats
    }

    /// Runs one task to completion. Never panics and never leaves the file
    /// in `processing/` unless the final move itself fails.
    pub fn load(&self, file: StagedFile) -> LoadResult {
        let filename = sanitize::redact_path(file.path());
        let _load_span = info_span!("load",
            file = %filename,
            format = self.decoder.name(),
        )
        .entered();

        let mut ctx = LoadContext::new(file);

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.write(&mut ctx))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(id = ?ctx.id, error = %e, "Load failed before write");
                WriteOutcome::failed(ctx.id.clone(), e.code(), e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(id = ?ctx.id, state = ?ctx.state, "Load task panicked: {}", message);
                WriteOutcome::failed(
                    ctx.id.clone(),
                    FailureCode::Exception,
                    format!("task panicked: {}", message),
                )
            }
        };

        let result = {
            let _step = info_span!("relocate").entered();
            self.step_relocate(ctx, outcome)
        };
        self.stats.record(&result);
        result
    }

    fn write(&self, ctx: &mut LoadContext) -> Result<WriteOutcome, LoadError> {
        let mut document = {
            let _step = info_span!("decode").entered();
            self.step_decode(ctx)?
        };

        let id = {
            let _step = info_span!("resolve_id").entered();
            self.step_resolve_id(ctx, &document)?
        };

        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));

        let _step = info_span!("upsert", id = %id).entered();
        let outcome = self.upserter.upsert(&id, document);
        ctx.state = LoadState::Written;
        Ok(outcome)
    }

    fn step_decode(&self, ctx: &mut LoadContext) -> Result<Document, LoadError> {
        let path = ctx.file.path();
        let bytes = std::fs::read(path).map_err(|e| DecodeError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let document = self.decoder.decode(&bytes)?;
        ctx.state = LoadState::Loaded;
        Ok(document)
    }

    fn step_resolve_id(
        &self,
        ctx: &mut LoadContext,
        document: &Document,
    ) -> Result<String, LoadError> {
        if let Some(id) = &ctx.id {
            return Ok(id.clone());
        }
        let id = resolve_id(&self.id_source, ctx.file.original_name(), document)?;
        debug!(id = %id, "Resolved document id");
        ctx.id = Some(id.clone());
        ctx.state = LoadState::IdResolved;
        Ok(id)
    }

    fn step_relocate(&self, ctx: LoadContext, outcome: WriteOutcome) -> LoadResult {
        let original_name = ctx.file.original_name().to_string();
        let (stage, destination) = self.destination(&original_name, &outcome);
        let source: PathBuf = ctx.file.path().to_path_buf();

        match ctx.file.relocate(destination, stage) {
            Ok(file) => {
                info!(
                    id = ?outcome.id(),
                    "{} --> {} ({})",
                    original_name,
                    stage,
                    outcome
                );
                LoadResult {
                    original_name,
                    outcome,
                    path: file.path().to_path_buf(),
                    stage: file.stage(),
                }
            }
            Err(e) => {
                error!(
                    id = ?outcome.id(),
                    error = %e,
                    "move - FAILED - {} stays in processing ({}), clean up manually",
                    sanitize::redact_path(&source),
                    outcome
                );
                LoadResult {
                    original_name,
                    outcome,
                    path: source,
                    stage: Stage::Processing,
                }
            }
        }
    }

    fn destination(&self, original_name: &str, outcome: &WriteOutcome) -> (Stage, PathBuf) {
        let token = Uuid::new_v4();
        match (outcome.id(), outcome.revision()) {
            (Some(id), Some(revision)) => (
                Stage::Completed,
                self.dirs
                    .completed
                    .join(completed_name(original_name, id, revision.as_str(), &token)),
            ),
            _ => {
                let code = outcome.failure_code().unwrap_or(FailureCode::Exception);
                (
                    Stage::Failed,
                    self.dirs
                        .failed
                        .join(failed_name(original_name, code, &token)),
                )
            }
        }
    }
}
