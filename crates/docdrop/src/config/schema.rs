use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::document::{ContentDecoder, JsonDecoder, YamlDecoder};
use crate::staging::StageDirs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub directories: DirectoriesConfig,
    #[serde(default)]
    pub write: WriteConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Re-submit files left in `processing/` by an earlier, unclean run.
    #[serde(default)]
    pub recover_processing: bool,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Watch the staging directory continuously, or drain it once and exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Batch,
    Watch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoriesConfig {
    #[serde(default = "default_staging")]
    pub staging: PathBuf,
    #[serde(default = "default_processing")]
    pub processing: PathBuf,
    #[serde(default = "default_completed")]
    pub completed: PathBuf,
    #[serde(default = "default_failed")]
    pub failed: PathBuf,
}

fn default_staging() -> PathBuf {
    PathBuf::from("staging")
}

fn default_processing() -> PathBuf {
    PathBuf::from("processing")
}

fn default_completed() -> PathBuf {
    PathBuf::from("completed")
}

fn default_failed() -> PathBuf {
    PathBuf::from("failed")
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            staging: default_staging(),
            processing: default_processing(),
            completed: default_completed(),
            failed: default_failed(),
        }
    }
}

impl DirectoriesConfig {
    pub fn stage_dirs(&self) -> StageDirs {
        StageDirs::new(
            &self.staging,
            &self.processing,
            &self.completed,
            &self.failed,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub id_source: IdSource,
    #[serde(default)]
    pub merge_policy: MergePolicy,
}

fn default_concurrency() -> usize {
    num_cpus::get()
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            id_source: IdSource::default(),
            merge_policy: MergePolicy::default(),
        }
    }
}

/// Where a document's id comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IdSource {
    /// The staged file name without its extension.
    #[default]
    Filename,
    /// Values at these paths inside the document, joined with `_`.
    Fields { fields: Vec<String> },
}

/// How a document that hit a revision conflict is reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Local document wins entirely; only the stored revision is taken.
    #[default]
    Replace,
    /// Local document is deep-merged over the stored one.
    Merge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Only files with this extension are picked up; `null` accepts all.
    #[serde(default = "default_extension")]
    pub extension: Option<String>,
    #[serde(default)]
    pub format: DocumentFormat,
}

fn default_extension() -> Option<String> {
    Some("json".to_string())
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            format: DocumentFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Json,
    Yaml,
}

impl DocumentFormat {
    pub fn decoder(self) -> Box<dyn ContentDecoder> {
        match self {
            DocumentFormat::Json => Box::new(JsonDecoder),
            DocumentFormat::Yaml => Box::new(YamlDecoder),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Process-local store; nothing is persisted.
    #[default]
    Memory,
    Couchdb(CouchDbConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDbConfig {
    pub url: String,
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_file: Option<String>,
    #[serde(default)]
    pub password_env_var: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}
