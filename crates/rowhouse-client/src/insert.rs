//! Schema-driven inserts.

use std::sync::Arc;

use rowhouse_data::{DefaultKind, RowBinaryWriter, RowFormat, TableSchema, Value};

use crate::client::Client;
use crate::error::{ClientResult, SCHEMA_DRIFT_CODES};
use crate::http::engine::RequestSpec;
use crate::http::Summary;
use crate::settings::Settings;

/// A staged insert into one table.
///
/// Rows are staged field by field and committed with
/// [`Insert::commit_row`]; [`Insert::send`] ships the encoded batch. When
/// any column declares a `DEFAULT` expression the defaults-aware format is
/// used so unset fields fall back to the server default.
#[derive(Debug)]
pub struct Insert<'a> {
    client: &'a Client,
    table: String,
    schema: Arc<TableSchema>,
    writer: RowBinaryWriter,
    settings: Option<Settings>,
}

impl<'a> Insert<'a> {
    pub(crate) fn new(
        client: &'a Client,
        table: String,
        schema: Arc<TableSchema>,
        settings: Option<Settings>,
    ) -> ClientResult<Insert<'a>> {
        let has_defaults = schema
            .columns()
            .iter()
            .any(|c| c.default_kind() == DefaultKind::Default);
        let format = if has_defaults {
            RowFormat::RowBinaryWithDefaults
        } else {
            RowFormat::RowBinary
        };
        let writer = RowBinaryWriter::new(Arc::clone(&schema), format)?;
        Ok(Insert {
            client,
            table,
            schema,
            writer,
            settings,
        })
    }

    /// The resolved table schema.
    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// The wire format chosen for this insert.
    pub fn format(&self) -> RowFormat {
        self.writer.format()
    }

    /// Stages a value by case-insensitive column name.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> ClientResult<()> {
        self.writer.set_value(column, value)?;
        Ok(())
    }

    /// Stages a value at a 1-based column position.
    pub fn set_at(&mut self, index: usize, value: impl Into<Value>) -> ClientResult<()> {
        self.writer.set_value_at(index, value)?;
        Ok(())
    }

    /// Commits the staged row to the batch.
    pub fn commit_row(&mut self) -> ClientResult<()> {
        self.writer.commit_row()?;
        Ok(())
    }

    /// Rows committed so far.
    pub fn row_count(&self) -> u64 {
        self.writer.row_count()
    }

    /// Sends the batch and returns the server's write statistics.
    pub async fn send(mut self) -> ClientResult<InsertResponse> {
        let format = self.writer.format();
        let body = self.writer.take_buffer();
        let spec = RequestSpec {
            query_param: Some(format!("INSERT INTO {} FORMAT {}", self.table, format)),
            body,
            default_format: None,
        };
        let result = self
            .client
            .engine()
            .execute(&spec, self.settings.as_ref())
            .await;
        let response = match result {
            Ok(response) => response,
            Err(error) => {
                // Schema-drift errors evict the cached schema so the next
                // insert re-resolves it.
                if error
                    .server_code()
                    .is_some_and(|code| SCHEMA_DRIFT_CODES.contains(&code))
                {
                    self.client.invalidate_schema(&self.table);
                }
                return Err(error);
            }
        };
        let summary = response.summary();
        let query_id = response.query_id().map(str::to_string);
        response.close().await?;
        Ok(InsertResponse { summary, query_id })
    }
}

/// Types that know how to stage themselves as one row.
///
/// This is the seam for derived or reflective object-to-column mapping;
/// the client only defines the contract.
pub trait IntoRow {
    /// Stages this object's fields into the insert's current row.
    fn stage(&self, insert: &mut Insert<'_>) -> ClientResult<()>;
}

impl<'a> Insert<'a> {
    /// Stages and commits one object as a row.
    pub fn write_row(&mut self, row: &impl IntoRow) -> ClientResult<()> {
        row.stage(self)?;
        self.commit_row()
    }
}

/// Outcome of a completed insert.
#[derive(Debug, Clone)]
pub struct InsertResponse {
    summary: Summary,
    query_id: Option<String>,
}

impl InsertResponse {
    /// Counters reported by the server.
    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Rows the server acknowledged writing.
    pub fn written_rows(&self) -> u64 {
        self.summary.written_rows
    }

    /// Bytes the server acknowledged writing.
    pub fn written_bytes(&self) -> u64 {
        self.summary.written_bytes
    }

    /// The query id echoed by the server.
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }
}
