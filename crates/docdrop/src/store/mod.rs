//! The document-store collaborator the pipeline writes through.

pub mod couch;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::document::Document;
use crate::error::{ConfigError, StoreError};

pub use couch::CouchStore;
pub use memory::InMemoryStore;

/// Opaque revision assigned by the store on every successful write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionToken(String);

impl RevisionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The current stored version of a document.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    /// Full stored body, including `_id` and `_rev`.
    pub document: Document,
    pub revision: RevisionToken,
}

/// Result of a write the store accepted or refused on revision grounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    Inserted(RevisionToken),
    Updated(RevisionToken),
    /// The document exists and the supplied `_rev` is absent or stale.
    Conflict,
}

/// Create-or-update access to a revisioned document store.
///
/// `upsert` reads the base revision from the document's `_rev` field: a
/// document without one is an insert, and is refused with
/// [`StoreWrite::Conflict`] when the id already exists. Implementations must be
/// safe to call from many worker threads at once.
pub trait DocumentStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<StoredDocument>, StoreError>;

    fn upsert(&self, id: &str, document: &Document) -> Result<StoreWrite, StoreError>;
}

/// Builds the configured store. `concurrency` sizes any connection pool.
pub fn from_config(
    config: &StoreConfig,
    concurrency: usize,
) -> Result<Arc<dyn DocumentStore>, ConfigError> {
    match config {
        StoreConfig::Memory => {
            tracing::warn!("Using the in-memory store; documents will not be persisted");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreConfig::Couchdb(couch) => {
            let store = CouchStore::from_config(couch, concurrency)?;
            Ok(Arc::new(store))
        }
    }
}
