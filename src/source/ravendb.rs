//! RavenDB HTTP client
//!
//! Implements [`ServerClient`] and [`DatabaseClient`] over the read-only REST
//! endpoints of a RavenDB server:
//!
//! - `GET /databases?start=&pageSize=&namesOnly=true`
//! - `GET /databases/{db}/collections/stats`
//! - `GET /databases/{db}/collections/docs?name=&start=&pageSize=`
//! - `GET /databases/{db}/stats`
//!
//! Secured servers are reached with a client certificate (PEM holding the
//! certificate and its private key) and an optional trust store (PEM CA).

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    CollectionInfo, DatabaseClient, DatabaseStatistics, DocumentCursor, IndexMetadata,
    ServerClient, SourceError,
};
use crate::inference::{RawDocument, document_from_json};

/// Documents requested per page when no smaller limit applies
pub const DEFAULT_PAGE_SIZE: usize = 1024;

/// Database names requested per page
const DATABASE_PAGE_SIZE: usize = 100;

/// Connection settings for a RavenDB server
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: String,
    pub certificate_file_path: Option<PathBuf>,
    pub trust_store_file_path: Option<PathBuf>,
    pub request_timeout: Duration,
    pub page_size: usize,
}

impl ConnectionSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            certificate_file_path: None,
            trust_store_file_path: None,
            request_timeout: Duration::from_secs(30),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.certificate_file_path = Some(path.into());
        self
    }

    pub fn with_trust_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.trust_store_file_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout = Duration::from_secs(seconds);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// Shared HTTP state for the server and its databases
#[derive(Debug)]
struct HttpContext {
    client: reqwest::Client,
    base_url: String,
    page_size: usize,
}

impl HttpContext {
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| map_transport_error(e, &url))?;

        if !response.status().is_success() {
            return Err(SourceError::Http {
                status: response.status().as_u16(),
                url,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| map_transport_error(e, &url))
    }
}

fn map_transport_error(err: reqwest::Error, url: &str) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(url.to_string())
    } else if err.is_decode() {
        SourceError::Decode(format!("{}: {}", url, err))
    } else {
        SourceError::Connection(format!("{}: {}", url, err))
    }
}

/// RavenDB server reached over HTTP(S)
#[derive(Debug, Clone)]
pub struct RavenDbServer {
    http: Arc<HttpContext>,
}

impl RavenDbServer {
    /// Build the HTTP client; certificate files are read here
    pub fn connect(settings: &ConnectionSettings) -> Result<Self, SourceError> {
        let mut builder = reqwest::Client::builder().timeout(settings.request_timeout);

        if let Some(path) = &settings.certificate_file_path {
            let pem = std::fs::read(path).map_err(|e| {
                SourceError::Tls(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let identity = reqwest::Identity::from_pkcs8_pem(&pem, &pem)
                .map_err(|e| SourceError::Tls(format!("Invalid client certificate: {}", e)))?;
            builder = builder.identity(identity);
        }

        if let Some(path) = &settings.trust_store_file_path {
            let pem = std::fs::read(path).map_err(|e| {
                SourceError::Tls(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let ca = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| SourceError::Tls(format!("Invalid trust store: {}", e)))?;
            builder = builder.add_root_certificate(ca);
        }

        let client = builder
            .build()
            .map_err(|e| SourceError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http: Arc::new(HttpContext {
                client,
                base_url: settings.url.clone(),
                page_size: settings.page_size,
            }),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DatabaseNamesPage {
    #[serde(default)]
    databases: Vec<String>,
}

#[async_trait]
impl ServerClient for RavenDbServer {
    async fn list_databases(&self) -> Result<Vec<String>, SourceError> {
        let mut names = Vec::new();
        let mut start = 0;
        loop {
            let page: DatabaseNamesPage = self
                .http
                .get_json(&format!(
                    "/databases?start={}&pageSize={}&namesOnly=true",
                    start, DATABASE_PAGE_SIZE
                ))
                .await?;
            let fetched = page.databases.len();
            names.extend(page.databases);
            if fetched < DATABASE_PAGE_SIZE {
                break;
            }
            start += fetched;
        }
        Ok(names)
    }

    fn database(&self, name: &str) -> Result<Arc<dyn DatabaseClient>, SourceError> {
        Ok(Arc::new(RavenDbDatabase {
            http: Arc::clone(&self.http),
            name: name.to_string(),
        }))
    }

    fn external_url(&self) -> Option<String> {
        Some(self.http.base_url.clone())
    }
}

/// One database on a [`RavenDbServer`]
#[derive(Debug, Clone)]
pub struct RavenDbDatabase {
    http: Arc<HttpContext>,
    name: String,
}

impl RavenDbDatabase {
    fn path(&self, suffix: &str) -> String {
        format!("/databases/{}{}", urlencoding::encode(&self.name), suffix)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CollectionStatsResponse {
    #[serde(default)]
    collections: BTreeMap<String, u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SizeResponse {
    #[serde(default)]
    size_in_bytes: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IndexResponse {
    name: String,
    #[serde(default)]
    is_stale: bool,
    last_indexing_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeMetadata {
    node_tag: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DatabaseStatsResponse {
    #[serde(default)]
    indexes: Vec<IndexResponse>,
    #[serde(default)]
    count_of_documents: u64,
    size_on_disk: Option<SizeResponse>,
    temp_buffers_size_on_disk: Option<SizeResponse>,
    database_change_vector: Option<String>,
    last_doc_etag: Option<i64>,
    last_database_etag: Option<i64>,
    last_indexing_time: Option<String>,
    #[serde(rename = "@metadata", default)]
    metadata: NodeMetadata,
}

impl From<DatabaseStatsResponse> for DatabaseStatistics {
    fn from(stats: DatabaseStatsResponse) -> Self {
        DatabaseStatistics {
            node_tag: stats.metadata.node_tag,
            indexes: stats
                .indexes
                .into_iter()
                .map(|index| IndexMetadata {
                    name: index.name,
                    stale: index.is_stale,
                    last_indexing_time: index.last_indexing_time,
                })
                .collect(),
            count_of_documents: stats.count_of_documents,
            size_on_disk_bytes: stats.size_on_disk.map_or(0, |s| s.size_in_bytes),
            temp_buffers_size_on_disk_bytes: stats
                .temp_buffers_size_on_disk
                .map_or(0, |s| s.size_in_bytes),
            database_change_vector: stats.database_change_vector,
            last_doc_etag: stats.last_doc_etag,
            last_database_etag: stats.last_database_etag,
            last_indexing_time: stats.last_indexing_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DocumentsPage {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[async_trait]
impl DatabaseClient for RavenDbDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, SourceError> {
        let stats: CollectionStatsResponse =
            self.http.get_json(&self.path("/collections/stats")).await?;
        Ok(stats
            .collections
            .into_iter()
            .map(|(name, count)| CollectionInfo::new(name, count))
            .collect())
    }

    async fn open_cursor(
        &self,
        collection: &str,
        limit_hint: Option<usize>,
    ) -> Result<Box<dyn DocumentCursor>, SourceError> {
        let mut cursor = HttpCursor {
            http: Arc::clone(&self.http),
            docs_path: format!(
                "{}?name={}",
                self.path("/collections/docs"),
                urlencoding::encode(collection)
            ),
            start: 0,
            remaining: limit_hint,
            buffer: VecDeque::new(),
            exhausted: false,
        };
        // the first page is fetched eagerly so an unreachable collection fails here
        cursor.fetch_page().await?;
        Ok(Box::new(cursor))
    }

    async fn database_statistics(&self) -> Result<DatabaseStatistics, SourceError> {
        let stats: DatabaseStatsResponse = self.http.get_json(&self.path("/stats")).await?;
        Ok(stats.into())
    }
}

/// Pages through `/collections/docs`
struct HttpCursor {
    http: Arc<HttpContext>,
    docs_path: String,
    start: usize,
    remaining: Option<usize>,
    buffer: VecDeque<RawDocument>,
    exhausted: bool,
}

impl HttpCursor {
    async fn fetch_page(&mut self) -> Result<(), SourceError> {
        let page_size = match self.remaining {
            Some(0) => {
                self.exhausted = true;
                return Ok(());
            }
            Some(n) => n.min(self.http.page_size),
            None => self.http.page_size,
        };

        let page: DocumentsPage = self
            .http
            .get_json(&format!(
                "{}&start={}&pageSize={}",
                self.docs_path, self.start, page_size
            ))
            .await?;

        let fetched = page.results.len();
        self.start += fetched;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(fetched);
        }
        if fetched < page_size {
            self.exhausted = true;
        }
        self.buffer
            .extend(page.results.into_iter().filter_map(document_from_json));
        Ok(())
    }
}

#[async_trait]
impl DocumentCursor for HttpCursor {
    async fn next_document(&mut self) -> Result<Option<RawDocument>, SourceError> {
        while self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buffer.pop_front())
    }
}
