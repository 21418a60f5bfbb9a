use std::sync::Arc;

use tracing::{debug, warn};

use super::outcome::{FailureCode, WriteOutcome};
use super::resolver::ConflictResolver;
use crate::config::MergePolicy;
use crate::document::Document;
use crate::store::{DocumentStore, StoreWrite};

/// Create-or-update of one document, with a single reconciliation pass on
/// revision conflict.
pub struct Upserter {
    store: Arc<dyn DocumentStore>,
    resolver: ConflictResolver,
}

impl Upserter {
    pub fn new(store: Arc<dyn DocumentStore>, policy: MergePolicy) -> Self {
        let resolver = ConflictResolver::new(Arc::clone(&store), policy);
        Self { store, resolver }
    }

    /// Writes `document` under `id`.
    ///
    /// A conflict on the first write sends the document through the
    /// [`ConflictResolver`] and retries exactly once; a second conflict is
    /// reported as [`FailureCode::Conflict`]. Store errors are never retried.
    /// `document` must already carry `id` in its `_id` field.
    pub fn upsert(&self, id: &str, document: Document) -> WriteOutcome {
        match self.store.upsert(id, &document) {
            Ok(StoreWrite::Inserted(revision)) => WriteOutcome::Inserted {
                id: id.to_string(),
                revision,
            },
            Ok(StoreWrite::Updated(revision)) => WriteOutcome::Updated {
                id: id.to_string(),
                revision,
            },
            Ok(StoreWrite::Conflict) => {
                debug!(id = %id, "Write conflicted, reconciling with stored revision");
                self.reconcile_and_retry(id, document)
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Store write failed");
                WriteOutcome::failed(Some(id.to_string()), FailureCode::Store, e.to_string())
            }
        }
    }

    fn reconcile_and_retry(&self, id: &str, document: Document) -> WriteOutcome {
        let reconciled = match self.resolver.resolve(document) {
            Ok(reconciled) => reconciled,
            Err(e) => {
                warn!(id = %id, error = %e, "Conflict resolution failed");
                return WriteOutcome::failed(
                    Some(id.to_string()),
                    FailureCode::Resolve,
                    e.to_string(),
                );
            }
        };

        match self.store.upsert(id, &reconciled) {
            Ok(StoreWrite::Inserted(revision)) | Ok(StoreWrite::Updated(revision)) => {
                WriteOutcome::ConflictResolved {
                    id: id.to_string(),
                    revision,
                }
            }
            Ok(StoreWrite::Conflict) => {
                warn!(id = %id, "Write conflicted again after reconciliation");
                WriteOutcome::failed(
                    Some(id.to_string()),
                    FailureCode::Conflict,
                    "revision conflict persisted after reconciliation",
                )
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Store write failed after reconciliation");
                WriteOutcome::failed(Some(id.to_string()), FailureCode::Store, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ID_FIELD, REV_FIELD};
    use crate::error::StoreError;
    use crate::store::{InMemoryStore, RevisionToken, StoredDocument};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::thread;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    /// Replays scripted write results and serves a fixed stored document.
    struct ScriptedStore {
        writes: Mutex<VecDeque<Result<StoreWrite, StoreError>>>,
        stored: Option<Document>,
        gets: AtomicUsize,
        written: Mutex<Vec<Document>>,
    }

    impl ScriptedStore {
        fn new(writes: Vec<Result<StoreWrite, StoreError>>, stored: Option<Document>) -> Self {
            Self {
                writes: Mutex::new(writes.into()),
                stored,
                gets: AtomicUsize::new(0),
                written: Mutex::new(Vec::new()),
            }
        }
    }

    impl DocumentStore for ScriptedStore {
        fn get(&self, _id: &str) -> Result<Option<StoredDocument>, StoreError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Ok(self.stored.clone().map(|document| StoredDocument {
                revision: RevisionToken::new(
                    document[REV_FIELD].as_str().unwrap_or_default(),
                ),
                document,
            }))
        }

        fn upsert(&self, _id: &str, document: &Document) -> Result<StoreWrite, StoreError> {
            self.written.lock().unwrap().push(document.clone());
            self.writes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(StoreWrite::Conflict))
        }
    }

    fn rev(token: &str) -> RevisionToken {
        RevisionToken::new(token)
    }

    #[test]
    fn test_fresh_insert() {
        let store = Arc::new(InMemoryStore::new());
        let upserter = Upserter::new(store.clone(), MergePolicy::Replace);

        let input = doc(json!({"_id": "a", "v": 1}));
        let outcome = upserter.upsert("a", input.clone());
        assert!(matches!(outcome, WriteOutcome::Inserted { ref id, .. } if id == "a"));

        let mut stored = store.get("a").unwrap().unwrap().document;
        assert_eq!(stored.remove(REV_FIELD).map(|r| r.is_string()), Some(true));
        assert_eq!(stored, input);
    }

    #[test]
    fn test_second_write_resolves_conflict_with_replace() {
        let store = Arc::new(InMemoryStore::new());
        let upserter = Upserter::new(store.clone(), MergePolicy::Replace);

        upserter.upsert("a", doc(json!({"_id": "a", "v": 1, "old": true})));
        let second = doc(json!({"_id": "a", "v": 2}));
        let outcome = upserter.upsert("a", second.clone());

        let revision = match outcome {
            WriteOutcome::ConflictResolved { revision, .. } => revision,
            other => panic!("expected conflict resolution, got {:?}", other),
        };
        assert!(revision.as_str().starts_with("2-"));

        let mut stored = store.get("a").unwrap().unwrap().document;
        stored.remove(REV_FIELD);
        assert_eq!(stored, second);
    }

    #[test]
    fn test_second_write_merges_with_merge_policy() {
        let store = Arc::new(InMemoryStore::new());
        let upserter = Upserter::new(store.clone(), MergePolicy::Merge);

        upserter.upsert("a", doc(json!({"_id": "a", "keep": 1, "nested": {"x": 1}})));
        let outcome = upserter.upsert("a", doc(json!({"_id": "a", "nested": {"y": 2}})));
        assert!(matches!(outcome, WriteOutcome::ConflictResolved { .. }));

        let stored = store.get("a").unwrap().unwrap().document;
        assert_eq!(stored["keep"], 1);
        assert_eq!(stored["nested"], json!({"x": 1, "y": 2}));
    }

    #[test]
    fn test_update_with_matching_revision() {
        let store = Arc::new(InMemoryStore::new());
        let upserter = Upserter::new(store.clone(), MergePolicy::Replace);

        let first = upserter.upsert("a", doc(json!({"_id": "a", "v": 1})));
        let current = first.revision().unwrap().as_str().to_string();
        let outcome = upserter.upsert("a", doc(json!({"_id": "a", "_rev": current, "v": 2})));
        assert!(matches!(outcome, WriteOutcome::Updated { .. }));
    }

    #[test]
    fn test_store_error_skips_resolver() {
        let store = Arc::new(ScriptedStore::new(
            vec![Err(StoreError::UnexpectedStatus {
                status: 500,
                body: "boom".to_string(),
            })],
            None,
        ));
        let upserter = Upserter::new(store.clone(), MergePolicy::Replace);

        let outcome = upserter.upsert("a", doc(json!({"_id": "a"})));
        assert_eq!(outcome.failure_code(), Some(FailureCode::Store));
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_repeat_conflict_fails_after_one_reconciliation() {
        let stored = doc(json!({"_id": "a", "_rev": "5-x"}));
        let store = Arc::new(ScriptedStore::new(
            vec![Ok(StoreWrite::Conflict), Ok(StoreWrite::Conflict)],
            Some(stored),
        ));
        let upserter = Upserter::new(store.clone(), MergePolicy::Replace);

        let outcome = upserter.upsert("a", doc(json!({"_id": "a"})));
        assert_eq!(outcome.failure_code(), Some(FailureCode::Conflict));
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);

        let written = store.written.lock().unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[1][REV_FIELD], "5-x");
    }

    #[test]
    fn test_resolver_failure_surfaces_as_resolve_error() {
        let store = Arc::new(ScriptedStore::new(vec![Ok(StoreWrite::Conflict)], None));
        let upserter = Upserter::new(store.clone(), MergePolicy::Merge);

        let outcome = upserter.upsert("a", doc(json!({"_id": "a"})));
        assert_eq!(outcome.failure_code(), Some(FailureCode::Resolve));
        assert_eq!(outcome.id(), Some("a"));
    }

    #[test]
    fn test_retry_store_error_is_store_failure() {
        let store = Arc::new(ScriptedStore::new(
            vec![
                Ok(StoreWrite::Conflict),
                Err(StoreError::InvalidResponse("truncated".to_string())),
            ],
            Some(doc(json!({"_id": "a", "_rev": "1-a"}))),
        ));
        let upserter = Upserter::new(store, MergePolicy::Replace);

        let outcome = upserter.upsert("a", doc(json!({"_id": "a"})));
        assert_eq!(outcome.failure_code(), Some(FailureCode::Store));
    }

    #[test]
    fn test_retry_success_reports_conflict_resolved() {
        let store = Arc::new(ScriptedStore::new(
            vec![Ok(StoreWrite::Conflict), Ok(StoreWrite::Updated(rev("2-b")))],
            Some(doc(json!({"_id": "a", "_rev": "1-a"}))),
        ));
        let upserter = Upserter::new(store, MergePolicy::Replace);

        let outcome = upserter.upsert("a", doc(json!({"_id": "a"})));
        assert_eq!(
            outcome,
            WriteOutcome::ConflictResolved {
                id: "a".to_string(),
                revision: rev("2-b"),
            }
        );
    }

    #[test]
    fn test_concurrent_writers_same_id() {
        let store = Arc::new(InMemoryStore::new());
        let upserter = Arc::new(Upserter::new(store.clone(), MergePolicy::Replace));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|n| {
                let upserter = Arc::clone(&upserter);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut document = Document::new();
                    document.insert(ID_FIELD.to_string(), json!("shared"));
                    document.insert("writer".to_string(), json!(n));
                    barrier.wait();
                    upserter.upsert("shared", document)
                })
            })
            .collect();

        let outcomes: Vec<WriteOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let first_writes = outcomes
            .iter()
            .filter(|o| matches!(o, WriteOutcome::Inserted { .. } | WriteOutcome::Updated { .. }))
            .count();
        let resolved: Vec<_> = outcomes
            .iter()
            .filter(|o| matches!(o, WriteOutcome::ConflictResolved { .. }))
            .collect();
        assert_eq!(first_writes, 1);
        assert_eq!(resolved.len(), 1);

        let stored = store.get("shared").unwrap().unwrap();
        assert_eq!(Some(&stored.revision), resolved[0].revision());
        assert!(stored.revision.as_str().starts_with("2-"));
    }
}
