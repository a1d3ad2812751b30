//! Table schema cache with single-flight resolution.
//!
//! Keys are normalized `endpoint|database.table` strings. Each key holds a
//! `OnceCell`: concurrent resolvers await the first in-flight fetch, a
//! failed fetch leaves the cell empty so the next caller retries, and a
//! successful fetch pins the schema until the key is invalidated.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use rowhouse_data::TableSchema;

use crate::error::ClientResult;

type Cell = Arc<OnceCell<Arc<TableSchema>>>;

/// Concurrent schema cache.
#[derive(Debug, Default)]
pub(crate) struct SchemaCache {
    cells: Mutex<HashMap<String, Cell>>,
}

impl SchemaCache {
    pub fn new() -> SchemaCache {
        SchemaCache::default()
    }

    /// Normalized cache key.
    pub fn key(endpoint: &str, database: &str, table: &str) -> String {
        format!(
            "{}|{}.{}",
            endpoint.to_lowercase(),
            database.to_lowercase(),
            table.to_lowercase()
        )
    }

    /// Returns the cached schema, fetching it at most once per key.
    pub async fn resolve<F, Fut>(&self, key: &str, fetch: F) -> ClientResult<Arc<TableSchema>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<Arc<TableSchema>>>,
    {
        let cell = {
            let mut cells = self.cells.lock();
            Arc::clone(cells.entry(key.to_string()).or_default())
        };
        // Waiters coalesce on the cell; an error is not stored, so the key
        // stays resolvable.
        cell.get_or_try_init(fetch).await.map(Arc::clone)
    }

    /// Drops one key.
    pub fn invalidate(&self, key: &str) {
        if self.cells.lock().remove(key).is_some() {
            debug!(key, "invalidated cached schema");
        }
    }

    /// Drops everything.
    pub fn clear(&self) {
        self.cells.lock().clear();
    }

    /// Number of cached or in-flight keys.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rowhouse_data::parse_column_type;

    use crate::error::{ClientError, TransportError};

    fn schema() -> Arc<TableSchema> {
        Arc::new(TableSchema::new(vec![
            parse_column_type("UInt64").unwrap().with_name("id"),
        ]))
    }

    #[tokio::test]
    async fn test_single_flight() {
        let cache = Arc::new(SchemaCache::new());
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let fetches = Arc::clone(&fetches);
            handles.push(tokio::spawn(async move {
                cache
                    .resolve("e|db.t", || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(schema())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let cache = SchemaCache::new();
        let result = cache
            .resolve("e|db.t", || async {
                Err(ClientError::Transport(TransportError::NoResponse))
            })
            .await;
        assert!(result.is_err());

        // The next resolve runs the fetch again and succeeds.
        let result = cache.resolve("e|db.t", || async { Ok(schema()) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = SchemaCache::new();
        cache.resolve("e|db.t", || async { Ok(schema()) }).await.unwrap();
        assert_eq!(cache.len(), 1);
        cache.invalidate("e|db.t");
        assert_eq!(cache.len(), 0);

        let fetched = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fetched);
        cache
            .resolve("e|db.t", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(schema())
            })
            .await
            .unwrap();
        assert_eq!(fetched.load(Ordering::SeqCst), 1);
    }
}
