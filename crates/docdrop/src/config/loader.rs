use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::{Config, IdSource, StoreConfig};
use crate::error::ConfigError;

const SUPPORTED_VERSION: &str = "1.0";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != SUPPORTED_VERSION {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.write.concurrency == 0 {
        return Err(invalid("write.concurrency must be at least 1"));
    }

    if let IdSource::Fields { fields } = &config.write.id_source {
        if fields.is_empty() {
            return Err(invalid(
                "write.id_source of type 'fields' needs at least one field path",
            ));
        }
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(invalid("write.id_source contains an empty field path"));
        }
    }

    if let Some(ext) = &config.input.extension {
        if ext.is_empty() || ext.contains('/') {
            return Err(invalid(format!("Invalid input.extension '{}'", ext)));
        }
    }

    let dirs = &config.directories;
    let distinct: HashSet<_> = [
        &dirs.staging,
        &dirs.processing,
        &dirs.completed,
        &dirs.failed,
    ]
    .into_iter()
    .collect();
    if distinct.len() != 4 {
        return Err(invalid(
            "staging, processing, completed and failed directories must all differ",
        ));
    }

    if let StoreConfig::Couchdb(couch) = &config.store {
        if let Err(e) = reqwest::Url::parse(&couch.url) {
            return Err(invalid(format!("Invalid store.url '{}': {}", couch.url, e)));
        }
        if couch.database.trim().is_empty() {
            return Err(invalid("store.database must not be empty"));
        }
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DocumentFormat, MergePolicy, RunMode};
    use std::path::PathBuf;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();

        assert_eq!(config.mode, RunMode::Batch);
        assert_eq!(config.directories.staging, PathBuf::from("staging"));
        assert_eq!(config.directories.failed, PathBuf::from("failed"));
        assert!(config.write.concurrency >= 1);
        assert_eq!(config.write.id_source, IdSource::Filename);
        assert_eq!(config.write.merge_policy, MergePolicy::Replace);
        assert_eq!(config.input.extension.as_deref(), Some("json"));
        assert_eq!(config.input.format, DocumentFormat::Json);
        assert!(matches!(config.store, StoreConfig::Memory));
        assert!(!config.recover_processing);
        assert_eq!(config.shutdown_timeout_secs, 30);
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "mode": "watch",
            "directories": {
                "staging": "/data/in",
                "processing": "/data/work",
                "completed": "/data/done",
                "failed": "/data/err"
            },
            "write": {
                "concurrency": 8,
                "id_source": { "type": "fields", "fields": ["customer/id", "order"] },
                "merge_policy": "merge"
            },
            "input": { "extension": "yml", "format": "yaml" },
            "watch": { "poll_interval_ms": 250, "debounce_ms": 100 },
            "store": {
                "type": "couchdb",
                "url": "https://example.cloudant.com",
                "database": "orders",
                "username": "loader",
                "password_env_var": "ORDERS_PASSWORD"
            },
            "recover_processing": true,
            "shutdown_timeout_secs": 5
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.mode, RunMode::Watch);
        assert_eq!(config.directories.processing, PathBuf::from("/data/work"));
        assert_eq!(config.write.concurrency, 8);
        assert_eq!(
            config.write.id_source,
            IdSource::Fields {
                fields: vec!["customer/id".to_string(), "order".to_string()]
            }
        );
        assert_eq!(config.write.merge_policy, MergePolicy::Merge);
        assert_eq!(config.input.format, DocumentFormat::Yaml);
        assert_eq!(config.watch.poll_interval_ms, 250);
        assert!(config.recover_processing);

        match config.store {
            StoreConfig::Couchdb(couch) => {
                assert_eq!(couch.database, "orders");
                assert_eq!(couch.username.as_deref(), Some("loader"));
                assert_eq!(couch.timeout_secs, 30);
            }
            StoreConfig::Memory => panic!("expected couchdb store"),
        }
    }

    #[test]
    fn test_null_extension_accepts_everything() {
        let config =
            load_config_from_str(r#"{ "version": "1.0", "input": { "extension": null } }"#)
                .unwrap();
        assert!(config.input.extension.is_none());
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "write": { "concurrency": 0 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_field_list_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "write": { "id_source": { "type": "fields", "fields": [] } }
        }
        "#;
        assert!(load_config_from_str(config_json).is_err());
    }

    #[test]
    fn test_duplicate_directories_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "directories": { "staging": "same", "processing": "same" }
        }
        "#;
        assert!(load_config_from_str(config_json).is_err());
    }

    #[test]
    fn test_bad_store_url_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "store": { "type": "couchdb", "url": "not a url", "database": "db" }
        }
        "#;
        assert!(load_config_from_str(config_json).is_err());
    }

    #[test]
    fn test_unknown_merge_policy_is_parse_error() {
        let config_json = r#"{ "version": "1.0", "write": { "merge_policy": "union" } }"#;
        assert!(matches!(
            load_config_from_str(config_json),
            Err(ConfigError::ParseJson(_))
        ));
    }
}
