//! The client facade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use rowhouse_data::{parse_column_type, DefaultKind, Record, TableSchema};

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::http::engine::{RequestEngine, RequestSpec};
use crate::http::Summary;
use crate::insert::Insert;
use crate::query::QueryResponse;
use crate::schema_cache::SchemaCache;
use crate::settings::Settings;

/// Snapshot of client counters.
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    /// Queries submitted.
    pub queries: u64,
    /// Inserts submitted.
    pub inserts: u64,
    /// Commands submitted.
    pub commands: u64,
    /// Requests sent through the engine, including schema fetches.
    pub requests: u64,
    /// Requests retried.
    pub retries: u64,
    /// Sockets opened across all endpoint pools.
    pub connections_opened: u64,
    /// Sockets closed across all endpoint pools.
    pub connections_closed: u64,
    /// Checkouts served from an idle connection.
    pub connections_reused: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queries: AtomicU64,
    inserts: AtomicU64,
    commands: AtomicU64,
}

/// Asynchronous client for a ClickHouse-compatible database over HTTP.
///
/// The client is a value: it owns the connection pools, the schema cache
/// and the counters, and everything is released when it drops. Clones share
/// the same pools and cache.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: Arc<ClientConfig>,
    engine: RequestEngine,
    schemas: SchemaCache,
    counters: Counters,
    endpoint_key: String,
}

impl Client {
    /// Validates the configuration and creates a client.
    ///
    /// This is the only place configuration errors surface; calls on a
    /// built client never fail with [`crate::error::ConfigError`].
    pub fn new(config: ClientConfig) -> ClientResult<Client> {
        let endpoints = config.validate()?;
        let endpoint_key = endpoints
            .iter()
            .map(endpoint_key_part)
            .collect::<Vec<_>>()
            .join(",");
        let config = Arc::new(config);
        Ok(Client {
            inner: Arc::new(ClientInner {
                engine: RequestEngine::new(Arc::clone(&config), endpoints),
                config,
                schemas: SchemaCache::new(),
                counters: Counters::default(),
                endpoint_key,
            }),
        })
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Submits a query and returns the streamed response.
    pub async fn query(&self, sql: &str) -> ClientResult<QueryResponse> {
        self.query_with_settings(sql, Settings::new()).await
    }

    /// Submits a query with per-call settings.
    pub async fn query_with_settings(
        &self,
        sql: &str,
        settings: Settings,
    ) -> ClientResult<QueryResponse> {
        self.inner.counters.queries.fetch_add(1, Ordering::Relaxed);
        let spec = RequestSpec {
            query_param: None,
            body: Bytes::copy_from_slice(sql.as_bytes()),
            default_format: Some("RowBinaryWithNamesAndTypes"),
        };
        let response = self.inner.engine.execute(&spec, Some(&settings)).await?;
        Ok(QueryResponse { response })
    }

    /// Runs a query and materializes every row.
    pub async fn query_all(&self, sql: &str) -> ClientResult<Vec<Record>> {
        let response = self.query(sql).await?;
        response.rows().collect_rows().await
    }

    /// Executes a statement that produces no row stream (DDL, commands).
    pub async fn execute(&self, sql: &str) -> ClientResult<CommandResponse> {
        self.execute_with_settings(sql, Settings::new()).await
    }

    /// Executes a command with per-call settings.
    pub async fn execute_with_settings(
        &self,
        sql: &str,
        settings: Settings,
    ) -> ClientResult<CommandResponse> {
        self.inner.counters.commands.fetch_add(1, Ordering::Relaxed);
        let spec = RequestSpec {
            query_param: None,
            body: Bytes::copy_from_slice(sql.as_bytes()),
            default_format: None,
        };
        let response = self.inner.engine.execute(&spec, Some(&settings)).await?;
        let summary = response.summary();
        let query_id = response.query_id().map(str::to_string);
        response.close().await?;
        Ok(CommandResponse { summary, query_id })
    }

    /// Starts an insert into the table, resolving its schema through the
    /// cache.
    pub async fn insert(&self, table: &str) -> ClientResult<Insert<'_>> {
        self.insert_with_settings(table, Settings::new()).await
    }

    /// Starts an insert with per-call settings.
    pub async fn insert_with_settings(
        &self,
        table: &str,
        settings: Settings,
    ) -> ClientResult<Insert<'_>> {
        self.inner.counters.inserts.fetch_add(1, Ordering::Relaxed);
        let schema = self.table_schema(table).await?;
        Insert::new(self, self.qualified(table), schema, Some(settings))
    }

    /// Resolves (and caches) the schema of a table.
    ///
    /// Concurrent calls for the same table coalesce into one
    /// `DESCRIBE TABLE`; failures are not cached.
    pub async fn table_schema(&self, table: &str) -> ClientResult<Arc<TableSchema>> {
        let key = self.schema_key(table);
        let qualified = self.qualified(table);
        self.inner
            .schemas
            .resolve(&key, || self.fetch_schema(qualified))
            .await
    }

    /// Evicts one table from the schema cache.
    pub fn invalidate_schema(&self, table: &str) {
        self.inner.schemas.invalidate(&self.schema_key(table));
    }

    /// Evicts every cached schema.
    pub fn clear_schema_cache(&self) {
        self.inner.schemas.clear();
    }

    /// Snapshot of the client counters.
    pub fn stats(&self) -> ClientStats {
        let (opened, closed, reused) = self.inner.engine.connection_counts();
        ClientStats {
            queries: self.inner.counters.queries.load(Ordering::Relaxed),
            inserts: self.inner.counters.inserts.load(Ordering::Relaxed),
            commands: self.inner.counters.commands.load(Ordering::Relaxed),
            requests: self.inner.engine.stats().requests.load(Ordering::Relaxed),
            retries: self.inner.engine.stats().retries.load(Ordering::Relaxed),
            connections_opened: opened,
            connections_closed: closed,
            connections_reused: reused,
        }
    }

    pub(crate) fn engine(&self) -> &RequestEngine {
        &self.inner.engine
    }

    fn qualified(&self, table: &str) -> String {
        if table.contains('.') {
            return table.to_string();
        }
        match &self.inner.config.database {
            Some(database) => format!("{}.{}", database, table),
            None => table.to_string(),
        }
    }

    fn schema_key(&self, table: &str) -> String {
        let qualified = self.qualified(table);
        let qualified = if qualified.contains('.') {
            qualified
        } else {
            format!("default.{}", qualified)
        };
        let (database, name) = qualified.split_once('.').unwrap_or(("default", table));
        SchemaCache::key(&self.inner.endpoint_key, database, name)
    }

    async fn fetch_schema(&self, qualified: String) -> ClientResult<Arc<TableSchema>> {
        debug!(table = %qualified, "resolving table schema");
        let spec = RequestSpec {
            query_param: None,
            body: Bytes::copy_from_slice(format!("DESCRIBE TABLE {}", qualified).as_bytes()),
            default_format: Some("JSONEachRow"),
        };
        let mut response = self.inner.engine.execute(&spec, None).await?;
        let body = response.read_to_end().await?;
        let text = std::str::from_utf8(&body)
            .map_err(|_| rowhouse_data::DecodeError::InvalidUtf8)?;

        let mut columns = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let row: DescribeRow = serde_json::from_str(line).map_err(|e| {
                crate::error::ClientError::MalformedResponse(format!(
                    "bad DESCRIBE row {:?}: {}",
                    line, e
                ))
            })?;
            let column = parse_column_type(&row.type_name)?
                .with_name(row.name)
                .with_default_kind(DefaultKind::from_describe(&row.default_type));
            columns.push(column);
        }
        Ok(Arc::new(TableSchema::new(columns)))
    }
}

fn endpoint_key_part(url: &url::Url) -> String {
    format!(
        "{}:{}",
        url.host_str().unwrap_or_default(),
        url.port().unwrap_or(8123)
    )
}

/// One row of `DESCRIBE TABLE … FORMAT JSONEachRow`.
#[derive(Debug, Deserialize)]
struct DescribeRow {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    default_type: String,
}

/// Outcome of a completed command.
#[derive(Debug, Clone)]
pub struct CommandResponse {
    summary: Summary,
    query_id: Option<String>,
}

impl CommandResponse {
    /// Counters reported by the server.
    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// The query id echoed by the server.
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    #[test]
    fn test_build_validates_config() {
        assert!(matches!(
            Client::new(ClientConfig::new()),
            Err(ClientError::Config(_))
        ));
        assert!(Client::new(ClientConfig::new().add_endpoint("http://localhost:8123")).is_ok());
    }

    #[test]
    fn test_qualified_table_names() {
        let client = Client::new(
            ClientConfig::new()
                .add_endpoint("http://localhost:8123")
                .database("metrics"),
        )
        .unwrap();
        assert_eq!(client.qualified("events"), "metrics.events");
        assert_eq!(client.qualified("other.events"), "other.events");

        let bare = Client::new(ClientConfig::new().add_endpoint("http://localhost:8123")).unwrap();
        assert_eq!(bare.qualified("events"), "events");
    }
}
