use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::MergePolicy;
use crate::document::{deep_merge, Document, ID_FIELD, REV_FIELD};
use crate::error::ResolveError;
use crate::store::DocumentStore;

/// Reconciles a document whose write lost a revision race against the
/// store's current version of it.
pub struct ConflictResolver {
    store: Arc<dyn DocumentStore>,
    policy: MergePolicy,
}

impl ConflictResolver {
    pub fn new(store: Arc<dyn DocumentStore>, policy: MergePolicy) -> Self {
        Self { store, policy }
    }

    /// Fetches the stored version of `local` (by its `_id`) and returns the
    /// document to retry the write with.
    ///
    /// - [`MergePolicy::Replace`]: `local` unchanged apart from `_rev`, which is
    ///   set to the stored revision.
    /// - [`MergePolicy::Merge`]: `local` minus its `_rev`, deep-merged over the
    ///   stored body; the stored `_rev` survives the merge.
    pub fn resolve(&self, mut local: Document) -> Result<Document, ResolveError> {
        let id = local
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .ok_or(ResolveError::MissingId)?
            .to_string();

        let stored = self
            .store
            .get(&id)?
            .ok_or(ResolveError::NotFound { id: id.clone() })?;

        debug!(id = %id, revision = %stored.revision, policy = ?self.policy, "Reconciling conflict");

        match self.policy {
            MergePolicy::Replace => {
                local.insert(
                    REV_FIELD.to_string(),
                    Value::String(stored.revision.as_str().to_string()),
                );
                Ok(local)
            }
            MergePolicy::Merge => {
                local.remove(REV_FIELD);
                Ok(deep_merge(stored.document, local))
            }
        }
    }
}
