//! Database client abstraction
//!
//! Defines the read-only traits the ingestion core consumes and their
//! implementations:
//! - RavenDbServer: RavenDB REST API over HTTP (default)
//! - InMemoryServer: documents held in memory (tests and offline runs)

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::inference::RawDocument;

/// Error type for database client operations
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("TLS configuration error: {0}")]
    Tls(String),
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
}

impl SourceError {
    /// Whether a later attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Connection(_) | SourceError::Timeout(_) => true,
            SourceError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A collection and its document count as reported by the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub name: String,
    pub document_count: u64,
}

impl CollectionInfo {
    pub fn new(name: impl Into<String>, document_count: u64) -> Self {
        Self {
            name: name.into(),
            document_count,
        }
    }
}

/// Index metadata relevant to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub name: String,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_indexing_time: Option<String>,
}

impl IndexMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stale: false,
            last_indexing_time: None,
        }
    }

    pub fn with_last_indexing_time(mut self, time: impl Into<String>) -> Self {
        self.last_indexing_time = Some(time.into());
        self
    }

    pub fn with_stale(mut self, stale: bool) -> Self {
        self.stale = stale;
        self
    }

    /// Whether the index belongs to a collection
    ///
    /// RavenDB auto-indexes are named `Auto/<Collection>/By...`, static
    /// indexes by convention `<Collection>/By...`; a path segment equal to the
    /// collection name is taken as ownership.
    pub fn covers(&self, collection: &str) -> bool {
        self.name.split('/').any(|segment| segment == collection)
    }
}

/// Database-level statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatistics {
    pub node_tag: Option<String>,
    pub indexes: Vec<IndexMetadata>,
    pub count_of_documents: u64,
    pub size_on_disk_bytes: u64,
    pub temp_buffers_size_on_disk_bytes: u64,
    pub database_change_vector: Option<String>,
    pub last_doc_etag: Option<i64>,
    pub last_database_etag: Option<i64>,
    pub last_indexing_time: Option<String>,
}

impl DatabaseStatistics {
    /// Latest indexing time across the given indexes
    ///
    /// RavenDB timestamps are ISO-8601 in UTC with a fixed width, so the
    /// lexicographic maximum is the latest instant.
    pub fn latest_indexing_time<'a>(
        indexes: impl IntoIterator<Item = &'a IndexMetadata>,
    ) -> Option<String> {
        indexes
            .into_iter()
            .filter_map(|index| index.last_indexing_time.clone())
            .max()
    }
}

/// Forward-only stream of documents of one collection
#[async_trait]
pub trait DocumentCursor: Send {
    /// Next document, `None` once the collection is exhausted
    async fn next_document(&mut self) -> Result<Option<RawDocument>, SourceError>;
}

/// Read access to one database
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Name of the database
    fn name(&self) -> &str;

    /// Collections in the database, in the order the database reports them
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, SourceError>;

    /// Open a cursor over a collection
    ///
    /// `limit_hint` is the most documents the caller will read; clients use
    /// it to avoid fetching more than needed.
    async fn open_cursor(
        &self,
        collection: &str,
        limit_hint: Option<usize>,
    ) -> Result<Box<dyn DocumentCursor>, SourceError>;

    /// Database statistics, including all indexes
    async fn database_statistics(&self) -> Result<DatabaseStatistics, SourceError>;

    /// Indexes belonging to a collection
    ///
    /// Ingestion runs fetch `database_statistics` once per database and
    /// filter with `IndexMetadata::covers`, which yields the same list.
    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexMetadata>, SourceError> {
        let stats = self.database_statistics().await?;
        Ok(stats
            .indexes
            .into_iter()
            .filter(|index| index.covers(collection))
            .collect())
    }
}

/// Read access to a server hosting several databases
#[async_trait]
pub trait ServerClient: Send + Sync {
    /// All database names on the server
    async fn list_databases(&self) -> Result<Vec<String>, SourceError>;

    /// Client for one database
    fn database(&self, name: &str) -> Result<Arc<dyn DatabaseClient>, SourceError>;

    /// URL shown in catalog records
    fn external_url(&self) -> Option<String> {
        None
    }
}

pub mod memory;
#[cfg(feature = "http-client")]
pub mod ravendb;

pub use memory::{InMemoryDatabase, InMemoryServer};
#[cfg(feature = "http-client")]
pub use ravendb::{ConnectionSettings, RavenDbDatabase, RavenDbServer};
