use std::path::PathBuf;
use thiserror::Error;

use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum DocdropError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to resolve store password: {0}")]
    Secret(#[from] SecretError),
}

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("Directory '{path}' is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot rename files from '{from}' to '{to}': {source}")]
    RenameUnsupported {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to inspect '{path}': {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{0}' is not a claimed processing file")]
    NotProcessing(PathBuf),

    #[error("Path has no usable file name: {0}")]
    InvalidName(PathBuf),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Top-level value must be an object, found {found}")]
    NotAnObject { found: &'static str },
}

#[derive(Error, Debug)]
pub enum IdResolutionError {
    #[error("Cannot derive an id from file name '{0}'")]
    EmptyFilename(String),

    #[error("None of the id fields resolved to a value: {}", fields.join(", "))]
    Unresolved { fields: Vec<String> },

    #[error("Id field '{field}' holds a {found}, expected a scalar")]
    NotScalar { field: String, found: &'static str },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid store URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unexpected status {status} from store: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Malformed store response: {0}")]
    InvalidResponse(String),

    #[error("Store state unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Local document carries no '_id'")]
    MissingId,

    #[error("Document '{id}' no longer exists in the store")]
    NotFound { id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Workers did not drain within {}s", .0.as_secs())]
    DrainTimeout(std::time::Duration),
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to bridge log records into tracing: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("A global tracing subscriber is already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::FromEnvError),
}

pub type Result<T> = std::result::Result<T, DocdropError>;
