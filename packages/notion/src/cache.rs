//! Time-bounded schema cache in front of a [`NotionStore`].
//!
//! Schemas change rarely but are needed on every form render and every
//! map load. Entries expire after the configured TTL, and a successful
//! page creation invalidates the entry for its database so option lists
//! that Notion extended during the write are picked up.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use notion_map_location_models::DatabaseSchema;
use serde_json::Value;

use crate::{DatabaseSummary, NotionError, NotionStore};

#[derive(Debug, Clone)]
struct Entry {
    schema: DatabaseSchema,
    fetched_at: Instant,
}

/// Wraps a store and caches [`NotionStore::retrieve_database`] results.
#[derive(Debug)]
pub struct SchemaCache<S> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl<S: NotionStore> SchemaCache<S> {
    /// Creates a cache. A zero TTL disables caching.
    #[must_use]
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Drops the cached schema for one database.
    pub fn invalidate(&self, database_id: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(database_id);
    }

    /// Drops every cached schema.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn fresh(&self, database_id: &str) -> Option<DatabaseSchema> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(database_id)
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.schema.clone())
    }
}

#[async_trait]
impl<S: NotionStore> NotionStore for SchemaCache<S> {
    async fn retrieve_database(&self, database_id: &str) -> Result<DatabaseSchema, NotionError> {
        if let Some(schema) = self.fresh(database_id) {
            log::trace!("Schema cache hit for {database_id}");
            return Ok(schema);
        }

        let schema = self.inner.retrieve_database(database_id).await?;
        if !self.ttl.is_zero() {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    database_id.to_owned(),
                    Entry {
                        schema: schema.clone(),
                        fetched_at: Instant::now(),
                    },
                );
        }
        Ok(schema)
    }

    async fn query_database(&self, database_id: &str) -> Result<Vec<Value>, NotionError> {
        self.inner.query_database(database_id).await
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
        icon: Option<String>,
    ) -> Result<Value, NotionError> {
        let page = self.inner.create_page(database_id, properties, icon).await?;
        self.invalidate(database_id);
        Ok(page)
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Value, NotionError> {
        self.inner.retrieve_page(page_id).await
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseSummary>, NotionError> {
        self.inner.list_databases().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingStore {
        schema_reads: AtomicUsize,
    }

    #[async_trait]
    impl NotionStore for CountingStore {
        async fn retrieve_database(&self, id: &str) -> Result<DatabaseSchema, NotionError> {
            self.schema_reads.fetch_add(1, Ordering::SeqCst);
            Ok(DatabaseSchema::from_properties(id, Vec::new()))
        }

        async fn query_database(&self, _: &str) -> Result<Vec<Value>, NotionError> {
            Ok(Vec::new())
        }

        async fn create_page(
            &self,
            _: &str,
            _: Value,
            _: Option<String>,
        ) -> Result<Value, NotionError> {
            Ok(serde_json::json!({ "id": "new" }))
        }

        async fn retrieve_page(&self, id: &str) -> Result<Value, NotionError> {
            Ok(serde_json::json!({ "id": id }))
        }

        async fn list_databases(&self) -> Result<Vec<DatabaseSummary>, NotionError> {
            Ok(Vec::new())
        }
    }

    fn reads(cache: &SchemaCache<CountingStore>) -> usize {
        cache.inner().schema_reads.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn serves_repeat_reads_from_cache() {
        let cache = SchemaCache::new(CountingStore::default(), Duration::from_secs(60));
        cache.retrieve_database("db").await.unwrap();
        cache.retrieve_database("db").await.unwrap();
        assert_eq!(reads(&cache), 1);

        cache.retrieve_database("other").await.unwrap();
        assert_eq!(reads(&cache), 2);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches() {
        let cache = SchemaCache::new(CountingStore::default(), Duration::ZERO);
        cache.retrieve_database("db").await.unwrap();
        cache.retrieve_database("db").await.unwrap();
        assert_eq!(reads(&cache), 2);
    }

    #[tokio::test]
    async fn write_invalidates_database_entry() {
        let cache = SchemaCache::new(CountingStore::default(), Duration::from_secs(60));
        cache.retrieve_database("db").await.unwrap();
        cache
            .create_page("db", serde_json::json!({}), None)
            .await
            .unwrap();
        cache.retrieve_database("db").await.unwrap();
        assert_eq!(reads(&cache), 2);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let cache = SchemaCache::new(CountingStore::default(), Duration::from_millis(5));
        cache.retrieve_database("db").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.retrieve_database("db").await.unwrap();
        assert_eq!(reads(&cache), 2);
    }
}
