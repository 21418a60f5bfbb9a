//! Builders for test configurations.

#![allow(dead_code)]

use docdrop::config::{
    Config, DirectoriesConfig, DocumentFormat, IdSource, InputConfig, MergePolicy, RunMode,
    StoreConfig, WatchConfig, WriteConfig,
};
use docdrop::StageDirs;

/// Builder for `Config` instances pointing at a given layout.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Batch mode, two workers, filename ids, replace policy, in-memory store.
    pub fn new(dirs: &StageDirs) -> Self {
        Self {
            config: Config {
                version: "1.0".to_string(),
                mode: RunMode::Batch,
                directories: DirectoriesConfig {
                    staging: dirs.staging.clone(),
                    processing: dirs.processing.clone(),
                    completed: dirs.completed.clone(),
                    failed: dirs.failed.clone(),
                },
                write: WriteConfig {
                    concurrency: 2,
                    id_source: IdSource::Filename,
                    merge_policy: MergePolicy::Replace,
                },
                input: InputConfig::default(),
                watch: WatchConfig {
                    poll_interval_ms: 50,
                    debounce_ms: 50,
                },
                store: StoreConfig::Memory,
                recover_processing: false,
                shutdown_timeout_secs: 10,
            },
        }
    }

    pub fn watch(mut self) -> Self {
        self.config.mode = RunMode::Watch;
        self
    }

    pub fn concurrency(mut self, workers: usize) -> Self {
        self.config.write.concurrency = workers;
        self
    }

    pub fn id_fields(mut self, fields: &[&str]) -> Self {
        self.config.write.id_source = IdSource::Fields {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        };
        self
    }

    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.config.write.merge_policy = policy;
        self
    }

    pub fn yaml(mut self) -> Self {
        self.config.input = InputConfig {
            extension: Some("yaml".to_string()),
            format: DocumentFormat::Yaml,
        };
        self
    }

    pub fn extension(mut self, extension: Option<&str>) -> Self {
        self.config.input.extension = extension.map(str::to_string);
        self
    }

    pub fn recover_processing(mut self) -> Self {
        self.config.recover_processing = true;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
