//! In-memory database client
//!
//! Serves documents held in memory through the same traits as the HTTP
//! client. Used by tests and by offline inference over exported documents.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;

use super::{
    CollectionInfo, DatabaseClient, DatabaseStatistics, DocumentCursor, IndexMetadata,
    ServerClient, SourceError,
};
use crate::inference::RawDocument;

/// In-memory server holding any number of databases
#[derive(Debug, Clone, Default)]
pub struct InMemoryServer {
    databases: BTreeMap<String, Arc<InMemoryDatabase>>,
}

impl InMemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a database, replacing one of the same name
    pub fn with_database(mut self, database: InMemoryDatabase) -> Self {
        self.databases
            .insert(database.name.clone(), Arc::new(database));
        self
    }
}

#[async_trait]
impl ServerClient for InMemoryServer {
    async fn list_databases(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.databases.keys().cloned().collect())
    }

    fn database(&self, name: &str) -> Result<Arc<dyn DatabaseClient>, SourceError> {
        self.databases
            .get(name)
            .map(|db| Arc::clone(db) as Arc<dyn DatabaseClient>)
            .ok_or_else(|| SourceError::DatabaseNotFound(name.to_string()))
    }
}

/// One in-memory database
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    name: String,
    collections: BTreeMap<String, Arc<Vec<RawDocument>>>,
    indexes: Vec<IndexMetadata>,
    unavailable: BTreeSet<String>,
    failing_reads: BTreeMap<String, usize>,
    node_tag: Option<String>,
}

impl InMemoryDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_tag: Some("A".to_string()),
            ..Default::default()
        }
    }

    pub fn with_collection(mut self, name: impl Into<String>, documents: Vec<RawDocument>) -> Self {
        self.collections.insert(name.into(), Arc::new(documents));
        self
    }

    pub fn with_index(mut self, index: IndexMetadata) -> Self {
        self.indexes.push(index);
        self
    }

    /// Listed by `list_collections` but fails to open a cursor
    pub fn with_unavailable_collection(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.collections.entry(name.clone()).or_default();
        self.unavailable.insert(name);
        self
    }

    /// Cursor fails with a timeout after yielding `after` documents
    pub fn with_failing_read(mut self, name: impl Into<String>, after: usize) -> Self {
        self.failing_reads.insert(name.into(), after);
        self
    }

    pub fn document_count(&self) -> u64 {
        self.collections.values().map(|docs| docs.len() as u64).sum()
    }
}

#[async_trait]
impl DatabaseClient for InMemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>, SourceError> {
        Ok(self
            .collections
            .iter()
            .map(|(name, docs)| CollectionInfo::new(name.clone(), docs.len() as u64))
            .collect())
    }

    async fn open_cursor(
        &self,
        collection: &str,
        limit_hint: Option<usize>,
    ) -> Result<Box<dyn DocumentCursor>, SourceError> {
        if self.unavailable.contains(collection) {
            return Err(SourceError::Connection(format!(
                "collection '{}' is unavailable",
                collection
            )));
        }
        let documents = self
            .collections
            .get(collection)
            .ok_or_else(|| SourceError::CollectionNotFound(collection.to_string()))?;

        let take = limit_hint.unwrap_or(documents.len());
        Ok(Box::new(InMemoryCursor {
            collection: collection.to_string(),
            pending: documents.iter().take(take).cloned().collect(),
            yielded: 0,
            fail_after: self.failing_reads.get(collection).copied(),
        }))
    }

    async fn database_statistics(&self) -> Result<DatabaseStatistics, SourceError> {
        Ok(DatabaseStatistics {
            node_tag: self.node_tag.clone(),
            indexes: self.indexes.clone(),
            count_of_documents: self.document_count(),
            last_indexing_time: DatabaseStatistics::latest_indexing_time(&self.indexes),
            ..Default::default()
        })
    }
}

struct InMemoryCursor {
    collection: String,
    pending: VecDeque<RawDocument>,
    yielded: usize,
    fail_after: Option<usize>,
}

#[async_trait]
impl DocumentCursor for InMemoryCursor {
    async fn next_document(&mut self) -> Result<Option<RawDocument>, SourceError> {
        if self.fail_after == Some(self.yielded) {
            return Err(SourceError::Timeout(format!(
                "reading '{}' after {} documents",
                self.collection, self.yielded
            )));
        }
        let next = self.pending.pop_front();
        if next.is_some() {
            self.yielded += 1;
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::inference::document_from_json;

    fn docs(n: usize) -> Vec<RawDocument> {
        (0..n)
            .map(|i| document_from_json(json!({"Id": i})).unwrap())
            .collect()
    }

    async fn drain(cursor: &mut Box<dyn DocumentCursor>) -> Result<usize, SourceError> {
        let mut n = 0;
        while cursor.next_document().await?.is_some() {
            n += 1;
        }
        Ok(n)
    }

    #[tokio::test]
    async fn test_cursor_respects_limit_hint() {
        let db = InMemoryDatabase::new("shop").with_collection("Products", docs(5));
        let mut all = db.open_cursor("Products", None).await.unwrap();
        let mut two = db.open_cursor("Products", Some(2)).await.unwrap();
        assert_eq!(drain(&mut all).await.unwrap(), 5);
        assert_eq!(drain(&mut two).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_collection_is_listed_but_fails() {
        let db = InMemoryDatabase::new("shop").with_unavailable_collection("Broken");
        let names: Vec<_> = db
            .list_collections()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Broken"]);
        assert!(db.open_cursor("Broken", None).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_read() {
        let db = InMemoryDatabase::new("shop")
            .with_collection("Orders", docs(3))
            .with_failing_read("Orders", 1);
        let mut cursor = db.open_cursor("Orders", None).await.unwrap();
        assert!(cursor.next_document().await.unwrap().is_some());
        assert!(matches!(
            cursor.next_document().await,
            Err(SourceError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_server_lookup_and_indexes() {
        let server = InMemoryServer::new().with_database(
            InMemoryDatabase::new("shop")
                .with_collection("Products", docs(1))
                .with_index(IndexMetadata::new("Auto/Products/ByName"))
                .with_index(IndexMetadata::new("Orders/Totals")),
        );
        assert_eq!(server.list_databases().await.unwrap(), vec!["shop"]);
        assert!(matches!(
            server.database("missing"),
            Err(SourceError::DatabaseNotFound(_))
        ));

        let db = server.database("shop").unwrap();
        let indexes = db.list_indexes("Products").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "Auto/Products/ByName");
        assert_eq!(db.database_statistics().await.unwrap().count_of_documents, 1);
    }
}
