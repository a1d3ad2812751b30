//! Row-by-row staging writer for inserts.
//!
//! Values are staged per column and nothing hits the output until
//! [`RowBinaryWriter::commit_row`]. Columns the server computes itself
//! (MATERIALIZED / ALIAS / EPHEMERAL) are never written; with the
//! defaults-aware format, unset DEFAULT columns emit the use-default marker
//! instead of a value.

use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::column::DefaultKind;
use crate::error::{EncodeError, SchemaError};
use crate::rowbinary::encode_value;
use crate::schema::TableSchema;
use crate::value::Value;

/// Row-oriented binary output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    /// Plain RowBinary.
    RowBinary,
    /// RowBinary with a leading per-field use-default marker.
    RowBinaryWithDefaults,
    /// RowBinary preceded by a names/types header; produced by the server
    /// for query results.
    RowBinaryWithNamesAndTypes,
}

impl RowFormat {
    /// The format name as sent in SQL `FORMAT` clauses.
    pub fn as_str(self) -> &'static str {
        match self {
            RowFormat::RowBinary => "RowBinary",
            RowFormat::RowBinaryWithDefaults => "RowBinaryWithDefaults",
            RowFormat::RowBinaryWithNamesAndTypes => "RowBinaryWithNamesAndTypes",
        }
    }
}

impl fmt::Display for RowFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stages one row at a time and encodes committed rows into a buffer.
#[derive(Debug)]
pub struct RowBinaryWriter {
    schema: Arc<TableSchema>,
    format: RowFormat,
    row: Vec<Option<Value>>,
    row_started: bool,
    row_count: u64,
    out: BytesMut,
}

impl RowBinaryWriter {
    /// Creates a writer for the schema in the given format.
    ///
    /// Only [`RowFormat::RowBinary`] and [`RowFormat::RowBinaryWithDefaults`]
    /// can be written.
    pub fn new(schema: Arc<TableSchema>, format: RowFormat) -> Result<RowBinaryWriter, EncodeError> {
        if format == RowFormat::RowBinaryWithNamesAndTypes {
            return Err(EncodeError::UnsupportedFormat(format.to_string()));
        }
        let width = schema.len();
        Ok(RowBinaryWriter {
            schema,
            format,
            row: vec![None; width],
            row_started: false,
            row_count: 0,
            out: BytesMut::new(),
        })
    }

    /// The output format.
    pub fn format(&self) -> RowFormat {
        self.format
    }

    /// Rows committed so far.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// True when at least one field of the current row has been set.
    pub fn row_started(&self) -> bool {
        self.row_started
    }

    /// Stages a value by case-insensitive column name.
    pub fn set_value(
        &mut self,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<(), SchemaError> {
        let index = self.schema.index_of(column)?;
        self.row[index] = Some(value.into());
        self.row_started = true;
        Ok(())
    }

    /// Stages a value at a 1-based column position.
    pub fn set_value_at(
        &mut self,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<(), SchemaError> {
        let pos = index
            .checked_sub(1)
            .filter(|&p| p < self.row.len())
            .ok_or_else(|| SchemaError::UnknownColumn(format!("#{}", index)))?;
        self.row[pos] = Some(value.into());
        self.row_started = true;
        Ok(())
    }

    /// Discards the staged row without writing it.
    pub fn clear_row(&mut self) {
        self.row.iter_mut().for_each(|slot| *slot = None);
        self.row_started = false;
    }

    /// Encodes the staged row and resets the staging buffer.
    ///
    /// A row with no fields set is a no-op, mirroring the staging contract:
    /// nothing is written until something was staged.
    pub fn commit_row(&mut self) -> Result<(), EncodeError> {
        if !self.row_started {
            return Ok(());
        }
        let with_defaults = self.format == RowFormat::RowBinaryWithDefaults;
        for (index, column) in self.schema.columns().iter().enumerate() {
            if column.default_kind().is_generated() {
                continue;
            }
            match self.row[index].as_ref() {
                Some(value) => {
                    if with_defaults {
                        self.out.put_u8(0);
                    }
                    encode_value(&mut self.out, column, value)?;
                }
                None if with_defaults && column.default_kind() == DefaultKind::Default => {
                    self.out.put_u8(1);
                }
                None if column.is_nullable() => {
                    if with_defaults {
                        self.out.put_u8(0);
                    }
                    encode_value(&mut self.out, column, &Value::Null)?;
                }
                None => {
                    return Err(EncodeError::MissingRequired {
                        column: column.name().to_string(),
                    })
                }
            }
        }
        self.clear_row();
        self.row_count += 1;
        Ok(())
    }

    /// The encoded bytes of all committed rows.
    pub fn buffer(&self) -> &[u8] {
        &self.out
    }

    /// Takes the encoded bytes, leaving the writer empty.
    pub fn take_buffer(&mut self) -> Bytes {
        self.out.split().freeze()
    }
}
