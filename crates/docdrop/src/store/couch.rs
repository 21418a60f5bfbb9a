use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{DocumentStore, RevisionToken, StoreWrite, StoredDocument};
use crate::config::CouchDbConfig;
use crate::document::{revision_of, Document};
use crate::error::{ConfigError, StoreError};
use crate::secrets::resolve_secret_optional;

/// CouchDB / Cloudant document API over blocking HTTP.
pub struct CouchStore {
    client: Client,
    base: Url,
    database: String,
    username: Option<String>,
    password: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    rev: String,
}

impl CouchStore {
    pub fn new(
        base: Url,
        database: impl Into<String>,
        timeout: Duration,
        max_connections: usize,
    ) -> Result<Self, StoreError> {
        if base.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl {
                url: base.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(max_connections)
            .user_agent(concat!("docdrop/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base,
            database: database.into(),
            username: None,
            password: None,
        })
    }

    pub fn with_credentials(mut self, username: String, password: Option<SecretString>) -> Self {
        self.username = Some(username);
        self.password = password;
        self
    }

    pub fn from_config(config: &CouchDbConfig, concurrency: usize) -> Result<Self, ConfigError> {
        let base = Url::parse(&config.url).map_err(|e| ConfigError::Validation {
            message: format!("Invalid store.url '{}': {}", config.url, e),
        })?;

        let store = Self::new(
            base,
            config.database.clone(),
            Duration::from_secs(config.timeout_secs),
            concurrency,
        )
        .map_err(|e| ConfigError::Validation {
            message: format!("Cannot create store client: {}", e),
        })?;

        let Some(username) = config.username.clone() else {
            return Ok(store);
        };
        let password = resolve_secret_optional(
            config.password.as_deref(),
            config.password_file.as_deref(),
            config.password_env_var.as_deref(),
        )?;
        Ok(store.with_credentials(username, password))
    }

    fn document_url(&self, id: &str) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl {
                url: self.base.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .push(&self.database)
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(
                user,
                self.password.as_ref().map(|p| p.expose_secret().to_string()),
            ),
            None => builder,
        }
    }
}

fn unexpected(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    StoreError::UnexpectedStatus { status, body }
}

impl DocumentStore for CouchStore {
    fn get(&self, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        let url = self.document_url(id)?;
        let response = self.request(Method::GET, url).send()?;

        match response.status() {
            StatusCode::OK => {
                let document: Document = response.json()?;
                let revision = revision_of(&document)
                    .map(RevisionToken::new)
                    .ok_or_else(|| {
                        StoreError::InvalidResponse(format!("document '{}' has no _rev", id))
                    })?;
                Ok(Some(StoredDocument { document, revision }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(unexpected(response)),
        }
    }

    fn upsert(&self, id: &str, document: &Document) -> Result<StoreWrite, StoreError> {
        let url = self.document_url(id)?;
        let response = self.request(Method::PUT, url).json(document).send()?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                let body: PutResponse = response.json()?;
                let revision = RevisionToken::new(body.rev);
                if revision_of(document).is_some() {
                    Ok(StoreWrite::Updated(revision))
                } else {
                    Ok(StoreWrite::Inserted(revision))
                }
            }
            StatusCode::CONFLICT => Ok(StoreWrite::Conflict),
            _ => Err(unexpected(response)),
        }
    }
}
