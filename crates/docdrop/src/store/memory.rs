use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use uuid::Uuid;

use super::{DocumentStore, RevisionToken, StoreWrite, StoredDocument};
use crate::document::{revision_of, Document, ID_FIELD, REV_FIELD};
use crate::error::StoreError;

/// Process-local store with CouchDB-style revisions (`<generation>-<hex>`).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: Mutex<HashMap<String, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn generation(revision: &str) -> u64 {
    revision
        .split_once('-')
        .and_then(|(generation, _)| generation.parse().ok())
        .unwrap_or(0)
}

fn next_revision(previous: Option<&str>) -> RevisionToken {
    let generation = previous.map(generation).unwrap_or(0) + 1;
    RevisionToken::new(format!("{}-{}", generation, Uuid::new_v4().simple()))
}

impl DocumentStore for InMemoryStore {
    fn get(&self, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| StoreError::Unavailable("document map lock poisoned".to_string()))?;

        Ok(documents.get(id).map(|document| StoredDocument {
            revision: RevisionToken::new(revision_of(document).unwrap_or_default()),
            document: document.clone(),
        }))
    }

    fn upsert(&self, id: &str, document: &Document) -> Result<StoreWrite, StoreError> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|_| StoreError::Unavailable("document map lock poisoned".to_string()))?;

        let current = documents.get(id).and_then(revision_of);
        let supplied = revision_of(document);

        let inserted = match (current, supplied) {
            (None, None) => true,
            (Some(current), Some(supplied)) if current == supplied => false,
            _ => return Ok(StoreWrite::Conflict),
        };

        let revision = next_revision(current);
        let mut stored = document.clone();
        stored.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        stored.insert(
            REV_FIELD.to_string(),
            Value::String(revision.as_str().to_string()),
        );
        documents.insert(id.to_string(), stored);

        Ok(if inserted {
            StoreWrite::Inserted(revision)
        } else {
            StoreWrite::Updated(revision)
        })
    }
}
