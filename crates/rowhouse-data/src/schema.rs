//! Table schemas.

use std::collections::HashMap;

use crate::column::Column;
use crate::error::SchemaError;

/// An immutable, ordered description of a table's columns.
///
/// Column-name lookup is case-insensitive. Once constructed the schema never
/// changes; invalidation replaces the whole object.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
}

impl TableSchema {
    /// Builds a schema from parsed columns in declaration order.
    pub fn new(columns: Vec<Column>) -> TableSchema {
        let by_name = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name().to_lowercase(), i))
            .collect();
        TableSchema { columns, by_name }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column at a 0-based position.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Case-insensitive lookup of a column's 0-based position.
    pub fn index_of(&self, name: &str) -> Result<usize, SchemaError> {
        self.by_name
            .get(&name.to_lowercase())
            .copied()
            .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()))
    }

    /// Case-insensitive lookup of a column.
    pub fn column_by_name(&self, name: &str) -> Result<&Column, SchemaError> {
        self.index_of(name).map(|i| &self.columns[i])
    }

    /// Columns that participate in row-binary payloads, i.e. everything the
    /// server does not compute itself.
    pub fn wire_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| !c.default_kind().is_generated())
    }
}
