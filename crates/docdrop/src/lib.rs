pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod staging;
pub mod store;
pub mod worker;
pub mod writer;

pub use config::{load_config, Config, DocumentFormat, IdSource, MergePolicy, RunMode};
pub use controller::Controller;
pub use document::{deep_merge, resolve_id, ContentDecoder, Document};
pub use error::{
    ConfigError, DecodeError, DocdropError, IdResolutionError, LoggingError, ResolveError,
    Result, StagingError, StoreError, WorkerError,
};
pub use logging::{init_logging, LogFormat};
pub use pipeline::{FileLoader, LoadResult, LoadStats, LoadSummary};
pub use staging::{Stage, StageDirs, StagedFile};
pub use store::{DocumentStore, InMemoryStore, RevisionToken, StoreWrite, StoredDocument};
pub use worker::{CancellationToken, DirectoryWatcher, Submission, WorkerPool};
pub use writer::{ConflictResolver, FailureCode, Upserter, WriteOutcome};
