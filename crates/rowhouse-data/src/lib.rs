//! # rowhouse-data
//!
//! Data layer for the rowhouse client: column types, the RowBinary wire
//! codec and the typed value model. This crate is pure serialization — it
//! knows nothing about HTTP or connections. It provides:
//!
//! - **Type registry**: parsing server type strings like
//!   `Array(Nullable(Decimal(9, 3)))` into [`Column`] descriptors
//! - **RowBinary codec**: a stream-oriented encoder and decoder driven by
//!   those descriptors
//! - **Value model**: [`Value`], [`Record`] and the [`Field`] accessor view
//! - **Row staging**: [`RowBinaryWriter`] with commit-per-row semantics and
//!   server-default markers
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use rowhouse_data::{parse_column_type, RowBinaryWriter, RowFormat, TableSchema};
//!
//! let schema = Arc::new(TableSchema::new(vec![
//!     parse_column_type("UInt64").unwrap().with_name("id"),
//!     parse_column_type("String").unwrap().with_name("name"),
//! ]));
//!
//! let mut writer = RowBinaryWriter::new(schema, RowFormat::RowBinary).unwrap();
//! writer.set_value("id", 42u64).unwrap();
//! writer.set_value("name", "alice").unwrap();
//! writer.commit_row().unwrap();
//! assert_eq!(writer.row_count(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Column descriptors.
pub mod column;

/// Fixed-point decimals.
pub mod decimal;

/// Error types.
pub mod error;

/// 256-bit integers.
pub mod int256;

/// Type-string parser.
pub mod parser;

/// RowBinary codec.
pub mod rowbinary;

/// Table schemas.
pub mod schema;

/// Values, records and field accessors.
pub mod value;

/// Row staging writer.
pub mod writer;

// Re-exports
pub use column::{Column, DefaultKind, TypeCategory};
pub use decimal::Decimal;
pub use error::{DecodeError, EncodeError, SchemaError, ValueError};
pub use int256::{I256, U256};
pub use parser::parse_column_type;
pub use rowbinary::{decode_value, encode_value, read_leb128, write_leb128, RowDecoder};
pub use schema::TableSchema;
pub use value::{Field, Record, Value};
pub use writer::{RowBinaryWriter, RowFormat};
