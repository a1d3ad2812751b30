//! Decoded values, records and typed field accessors.
//!
//! [`Value`] is plain storage: one decoded field with no knowledge of its
//! column. [`Record`] is one row bound to its [`TableSchema`]. [`Field`] is
//! a borrowed (column, value) pair; all typed accessors live here so the
//! conversions can be validated against the descriptor. Fields are views —
//! a streaming cursor reuses the record storage between rows, so anything
//! that must outlive the iteration step has to be copied out.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::column::{Column, TypeCategory};
use crate::decimal::Decimal;
use crate::error::{SchemaError, ValueError};
use crate::int256::{I256, U256};
use crate::schema::TableSchema;

/// A single decoded field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null for a nullable column.
    Null,
    /// 8-bit signed integer.
    Int8(i8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 128-bit signed integer.
    Int128(i128),
    /// 256-bit signed integer.
    Int256(I256),
    /// 8-bit unsigned integer.
    UInt8(u8),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 128-bit unsigned integer.
    UInt128(u128),
    /// 256-bit unsigned integer.
    UInt256(U256),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// Fixed-point decimal.
    Decimal(Decimal),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Raw bytes (FixedString payloads and non-UTF-8 strings).
    Bytes(Bytes),
    /// Calendar date.
    Date(NaiveDate),
    /// Instant; the column may carry a display timezone.
    DateTime(DateTime<Utc>),
    /// 128-bit UUID.
    Uuid(Uuid),
    /// IPv4 address.
    Ipv4(Ipv4Addr),
    /// IPv6 address.
    Ipv6(Ipv6Addr),
    /// Enum discriminant; the member name lives in the descriptor.
    Enum(i16),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Fixed-arity tuple.
    Tuple(Vec<Value>),
    /// Ordered key/value pairs.
    Map(Vec<(Value, Value)>),
    /// Opaque serialized roaring bitmap.
    Bitmap(Bytes),
}

impl Value {
    /// True if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A short tag for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Int8(_) => "Int8",
            Value::Int16(_) => "Int16",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Int128(_) => "Int128",
            Value::Int256(_) => "Int256",
            Value::UInt8(_) => "UInt8",
            Value::UInt16(_) => "UInt16",
            Value::UInt32(_) => "UInt32",
            Value::UInt64(_) => "UInt64",
            Value::UInt128(_) => "UInt128",
            Value::UInt256(_) => "UInt256",
            Value::Float32(_) => "Float32",
            Value::Float64(_) => "Float64",
            Value::Decimal(_) => "Decimal",
            Value::Bool(_) => "Bool",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Date(_) => "Date",
            Value::DateTime(_) => "DateTime",
            Value::Uuid(_) => "UUID",
            Value::Ipv4(_) => "IPv4",
            Value::Ipv6(_) => "IPv6",
            Value::Enum(_) => "Enum",
            Value::Array(_) => "Array",
            Value::Tuple(_) => "Tuple",
            Value::Map(_) => "Map",
            Value::Bitmap(_) => "Bitmap",
        }
    }

    /// Reads the value as `i64`, widening losslessly.
    pub(crate) fn to_i64(&self) -> Result<i64, ValueError> {
        match self {
            Value::Int8(v) => Ok(i64::from(*v)),
            Value::Int16(v) => Ok(i64::from(*v)),
            Value::Int32(v) => Ok(i64::from(*v)),
            Value::Int64(v) => Ok(*v),
            Value::Int128(v) => i64::try_from(*v).map_err(|_| overflow(v, "i64")),
            Value::Int256(v) => v.to_i64().ok_or_else(|| overflow(v, "i64")),
            Value::UInt8(v) => Ok(i64::from(*v)),
            Value::UInt16(v) => Ok(i64::from(*v)),
            Value::UInt32(v) => Ok(i64::from(*v)),
            Value::UInt64(v) => i64::try_from(*v).map_err(|_| overflow(v, "i64")),
            Value::UInt128(v) => i64::try_from(*v).map_err(|_| overflow(v, "i64")),
            Value::UInt256(v) => v
                .to_u128()
                .and_then(|v| i64::try_from(v).ok())
                .ok_or_else(|| overflow(v, "i64")),
            Value::Enum(v) => Ok(i64::from(*v)),
            Value::String(s) => parse_str(s, "i64"),
            other => Err(mismatch(other, "i64")),
        }
    }

    /// Reads the value as `u64`.
    pub(crate) fn to_u64(&self) -> Result<u64, ValueError> {
        match self {
            Value::UInt8(v) => Ok(u64::from(*v)),
            Value::UInt16(v) => Ok(u64::from(*v)),
            Value::UInt32(v) => Ok(u64::from(*v)),
            Value::UInt64(v) => Ok(*v),
            Value::UInt128(v) => u64::try_from(*v).map_err(|_| overflow(v, "u64")),
            Value::UInt256(v) => v.to_u64().ok_or_else(|| overflow(v, "u64")),
            Value::Int8(v) => u64::try_from(*v).map_err(|_| overflow(v, "u64")),
            Value::Int16(v) => u64::try_from(*v).map_err(|_| overflow(v, "u64")),
            Value::Int32(v) => u64::try_from(*v).map_err(|_| overflow(v, "u64")),
            Value::Int64(v) => u64::try_from(*v).map_err(|_| overflow(v, "u64")),
            Value::Int128(v) => u64::try_from(*v).map_err(|_| overflow(v, "u64")),
            Value::Int256(v) => v
                .to_u128()
                .and_then(|v| u64::try_from(v).ok())
                .ok_or_else(|| overflow(v, "u64")),
            Value::Enum(v) => u64::try_from(*v).map_err(|_| overflow(v, "u64")),
            Value::String(s) => parse_str(s, "u64"),
            other => Err(mismatch(other, "u64")),
        }
    }

    /// Reads the value as `i128`.
    pub(crate) fn to_i128(&self) -> Result<i128, ValueError> {
        match self {
            Value::Int128(v) => Ok(*v),
            Value::Int256(v) => v.to_i128().ok_or_else(|| overflow(v, "i128")),
            Value::UInt128(v) => i128::try_from(*v).map_err(|_| overflow(v, "i128")),
            Value::UInt256(v) => v
                .to_u128()
                .and_then(|v| i128::try_from(v).ok())
                .ok_or_else(|| overflow(v, "i128")),
            Value::UInt64(v) => Ok(i128::from(*v)),
            Value::String(s) => parse_str(s, "i128"),
            _ => self.to_i64().map(i128::from),
        }
    }

    /// Reads the value as `u128`.
    pub(crate) fn to_u128(&self) -> Result<u128, ValueError> {
        match self {
            Value::UInt128(v) => Ok(*v),
            Value::UInt256(v) => v.to_u128().ok_or_else(|| overflow(v, "u128")),
            Value::Int128(v) => u128::try_from(*v).map_err(|_| overflow(v, "u128")),
            Value::Int256(v) => v.to_u128().ok_or_else(|| overflow(v, "u128")),
            Value::String(s) => parse_str(s, "u128"),
            _ => self.to_u64().map(u128::from),
        }
    }

    /// Reads the value as a 256-bit signed integer.
    pub(crate) fn to_i256(&self) -> Result<I256, ValueError> {
        match self {
            Value::Int256(v) => Ok(*v),
            Value::UInt256(v) => {
                if v.0[3] >> 63 == 1 {
                    Err(overflow(v, "i256"))
                } else {
                    Ok(I256(v.0))
                }
            }
            Value::UInt128(v) => Ok(I256::from_u128(*v)),
            Value::String(s) => s.parse().map_err(|_| ValueError::InvalidString {
                value: s.clone(),
                target: "i256",
            }),
            _ => self.to_i128().map(I256::from_i128),
        }
    }

    /// Reads the value as a 256-bit unsigned integer.
    pub(crate) fn to_u256(&self) -> Result<U256, ValueError> {
        match self {
            Value::UInt256(v) => Ok(*v),
            Value::Int256(v) => {
                if v.is_negative() {
                    Err(overflow(v, "u256"))
                } else {
                    Ok(U256(v.0))
                }
            }
            Value::String(s) => s.parse().map_err(|_| ValueError::InvalidString {
                value: s.clone(),
                target: "u256",
            }),
            _ => self.to_u128().map(U256::from_u128),
        }
    }

    /// Reads the value as `f64`; integers and decimals convert.
    pub(crate) fn to_f64(&self) -> Result<f64, ValueError> {
        match self {
            Value::Float32(v) => Ok(f64::from(*v)),
            Value::Float64(v) => Ok(*v),
            Value::Decimal(d) => Ok(d.to_f64()),
            Value::Int128(v) => Ok(*v as f64),
            Value::Int256(v) => Ok(v.to_f64()),
            Value::UInt128(v) => Ok(*v as f64),
            Value::UInt256(v) => Ok(v.to_f64()),
            Value::String(s) => parse_str(s, "f64"),
            other => other.to_i64().map(|v| v as f64).or_else(|_| {
                other.to_u64().map(|v| v as f64).map_err(|_| mismatch(other, "f64"))
            }),
        }
    }

    /// Reads the value as a decimal; integers get scale 0.
    pub(crate) fn to_decimal(&self) -> Result<Decimal, ValueError> {
        match self {
            Value::Decimal(d) => Ok(*d),
            Value::Int256(v) => Ok(Decimal::new(*v, 0)),
            Value::String(s) => s.parse().map_err(|_| ValueError::InvalidString {
                value: s.clone(),
                target: "decimal",
            }),
            other => other
                .to_i128()
                .map(|v| Decimal::new(v, 0))
                .map_err(|_| mismatch(other, "decimal")),
        }
    }

    /// Reads the value as a boolean; 0/1 integers and "true"/"false" convert.
    pub(crate) fn to_bool(&self) -> Result<bool, ValueError> {
        match self {
            Value::Bool(v) => Ok(*v),
            Value::String(s) => match s.as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(ValueError::InvalidString {
                    value: s.clone(),
                    target: "bool",
                }),
            },
            other => match other.to_i64() {
                Ok(0) => Ok(false),
                Ok(1) => Ok(true),
                Ok(_) => Err(overflow(&other.kind(), "bool")),
                Err(_) => Err(mismatch(other, "bool")),
            },
        }
    }
}

fn overflow(value: &dyn std::fmt::Display, target: &'static str) -> ValueError {
    ValueError::Overflow {
        value: value.to_string(),
        target,
    }
}

fn mismatch(value: &Value, target: &'static str) -> ValueError {
    ValueError::TypeMismatch {
        value_kind: value.kind(),
        target,
    }
}

fn parse_str<T: std::str::FromStr>(s: &str, target: &'static str) -> Result<T, ValueError> {
    s.parse().map_err(|_| ValueError::InvalidString {
        value: s.to_string(),
        target,
    })
}

macro_rules! value_from {
    ($($from:ty => $variant:ident),* $(,)?) => {
        $(impl From<$from> for Value {
            fn from(value: $from) -> Value {
                Value::$variant(value)
            }
        })*
    };
}

value_from! {
    i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64, i128 => Int128,
    I256 => Int256,
    u8 => UInt8, u16 => UInt16, u32 => UInt32, u64 => UInt64, u128 => UInt128,
    U256 => UInt256,
    f32 => Float32, f64 => Float64,
    Decimal => Decimal, bool => Bool, String => String,
    NaiveDate => Date, Uuid => Uuid,
    Ipv4Addr => Ipv4, Ipv6Addr => Ipv6,
    Bytes => Bytes,
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Value {
        Value::DateTime(value)
    }
}

impl From<IpAddr> for Value {
    fn from(value: IpAddr) -> Value {
        match value {
            IpAddr::V4(v) => Value::Ipv4(v),
            IpAddr::V6(v) => Value::Ipv6(v),
        }
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Value {
        Value::Array(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Value {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// One row bound to its schema.
///
/// Cloning a record deep-copies its values; that is the way to keep data
/// past the iteration step of a streaming cursor.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<TableSchema>,
    values: Vec<Value>,
}

impl Record {
    /// Creates a record; `values` must be one per schema wire column.
    pub fn new(schema: Arc<TableSchema>, values: Vec<Value>) -> Record {
        Record { schema, values }
    }

    /// The schema this record was decoded with.
    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut Vec<Value> {
        &mut self.values
    }

    /// Field at a 1-based column position.
    pub fn field_at(&self, index: usize) -> Result<Field<'_>, SchemaError> {
        let pos = index
            .checked_sub(1)
            .filter(|&p| p < self.values.len())
            .ok_or_else(|| SchemaError::UnknownColumn(format!("#{}", index)))?;
        Ok(Field {
            column: self.column_at(pos),
            value: &self.values[pos],
        })
    }

    /// Field by case-insensitive column name.
    pub fn field(&self, name: &str) -> Result<Field<'_>, SchemaError> {
        let pos = self.schema.index_of(name)?;
        // The record holds wire columns only; map the schema position onto
        // the wire position by discounting generated columns before it.
        let skipped = self
            .schema
            .columns()
            .iter()
            .take(pos)
            .filter(|c| c.default_kind().is_generated())
            .count();
        let wire_pos = pos - skipped;
        if self.schema.columns()[pos].default_kind().is_generated() || wire_pos >= self.values.len()
        {
            return Err(SchemaError::UnknownColumn(name.to_string()));
        }
        Ok(Field {
            column: &self.schema.columns()[pos],
            value: &self.values[wire_pos],
        })
    }

    /// Iterates the fields in column order.
    pub fn fields(&self) -> impl Iterator<Item = Field<'_>> {
        self.schema
            .wire_columns()
            .zip(self.values.iter())
            .map(|(column, value)| Field { column, value })
    }

    fn column_at(&self, wire_pos: usize) -> &Column {
        self.schema
            .wire_columns()
            .nth(wire_pos)
            .unwrap_or_else(|| &self.schema.columns()[wire_pos])
    }
}

/// A borrowed (column, value) pair with typed accessors.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    column: &'a Column,
    value: &'a Value,
}

impl<'a> Field<'a> {
    /// Creates a field view over a descriptor and a value.
    pub fn new(column: &'a Column, value: &'a Value) -> Field<'a> {
        Field { column, value }
    }

    /// The column descriptor.
    pub fn column(&self) -> &'a Column {
        self.column
    }

    /// The raw value.
    pub fn value(&self) -> &'a Value {
        self.value
    }

    /// True if the decoded value is null.
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// The timezone the column was declared with, if any.
    pub fn timezone(&self) -> Option<&'a str> {
        let mut column = self.column;
        loop {
            if let Some(tz) = column.timezone() {
                return Some(tz);
            }
            match column.category() {
                TypeCategory::Nullable | TypeCategory::LowCardinality => {
                    column = &column.children()[0];
                }
                _ => return None,
            }
        }
    }

    fn non_null(&self) -> Result<&'a Value, ValueError> {
        if self.value.is_null() {
            Err(ValueError::Null)
        } else {
            Ok(self.value)
        }
    }

    /// Reads as `i64`; widening is lossless, narrowing checks range.
    pub fn as_i64(&self) -> Result<i64, ValueError> {
        self.non_null()?.to_i64()
    }

    /// Reads as `u64`.
    pub fn as_u64(&self) -> Result<u64, ValueError> {
        self.non_null()?.to_u64()
    }

    /// Reads as `i128`.
    pub fn as_i128(&self) -> Result<i128, ValueError> {
        self.non_null()?.to_i128()
    }

    /// Reads as a 256-bit signed integer.
    pub fn as_i256(&self) -> Result<I256, ValueError> {
        self.non_null()?.to_i256()
    }

    /// Reads as a 256-bit unsigned integer.
    pub fn as_u256(&self) -> Result<U256, ValueError> {
        self.non_null()?.to_u256()
    }

    /// Reads as `f64`.
    pub fn as_f64(&self) -> Result<f64, ValueError> {
        self.non_null()?.to_f64()
    }

    /// Reads as a decimal.
    pub fn as_decimal(&self) -> Result<Decimal, ValueError> {
        self.non_null()?.to_decimal()
    }

    /// Reads as a boolean.
    pub fn as_bool(&self) -> Result<bool, ValueError> {
        self.non_null()?.to_bool()
    }

    /// Borrows the value as a string slice.
    pub fn as_str(&self) -> Result<&'a str, ValueError> {
        match self.non_null()? {
            Value::String(s) => Ok(s),
            other => Err(mismatch(other, "str")),
        }
    }

    /// Renders the value as an owned string using canonical decimal forms.
    pub fn as_string(&self) -> Result<String, ValueError> {
        let value = self.non_null()?;
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Bool(v) => Ok(v.to_string()),
            Value::Int8(v) => Ok(v.to_string()),
            Value::Int16(v) => Ok(v.to_string()),
            Value::Int32(v) => Ok(v.to_string()),
            Value::Int64(v) => Ok(v.to_string()),
            Value::Int128(v) => Ok(v.to_string()),
            Value::Int256(v) => Ok(v.to_string()),
            Value::UInt8(v) => Ok(v.to_string()),
            Value::UInt16(v) => Ok(v.to_string()),
            Value::UInt32(v) => Ok(v.to_string()),
            Value::UInt64(v) => Ok(v.to_string()),
            Value::UInt128(v) => Ok(v.to_string()),
            Value::UInt256(v) => Ok(v.to_string()),
            Value::Float32(v) => Ok(v.to_string()),
            Value::Float64(v) => Ok(v.to_string()),
            Value::Decimal(v) => Ok(v.to_string()),
            Value::Date(v) => Ok(v.to_string()),
            Value::DateTime(v) => Ok(v.to_rfc3339()),
            Value::Uuid(v) => Ok(v.to_string()),
            Value::Ipv4(v) => Ok(v.to_string()),
            Value::Ipv6(v) => Ok(v.to_string()),
            Value::Enum(v) => match self.column.innermost().enum_name(*v) {
                Some(name) => Ok(name.to_string()),
                None => Ok(v.to_string()),
            },
            other => Err(mismatch(other, "string")),
        }
    }

    /// Borrows the value as bytes; strings expose their UTF-8 bytes.
    pub fn as_bytes(&self) -> Result<&'a [u8], ValueError> {
        match self.non_null()? {
            Value::Bytes(b) => Ok(b),
            Value::String(s) => Ok(s.as_bytes()),
            other => Err(mismatch(other, "bytes")),
        }
    }

    /// Reads as a calendar date.
    pub fn as_date(&self) -> Result<NaiveDate, ValueError> {
        match self.non_null()? {
            Value::Date(v) => Ok(*v),
            Value::DateTime(v) => Ok(v.date_naive()),
            other => Err(mismatch(other, "date")),
        }
    }

    /// Reads as an instant; dates widen to midnight UTC.
    pub fn as_datetime(&self) -> Result<DateTime<Utc>, ValueError> {
        match self.non_null()? {
            Value::DateTime(v) => Ok(*v),
            Value::Date(v) => Ok(DateTime::from_naive_utc_and_offset(
                v.and_time(chrono::NaiveTime::MIN),
                Utc,
            )),
            other => Err(mismatch(other, "datetime")),
        }
    }

    /// Reads as a UUID.
    pub fn as_uuid(&self) -> Result<Uuid, ValueError> {
        match self.non_null()? {
            Value::Uuid(v) => Ok(*v),
            Value::String(s) => parse_str(s, "uuid"),
            other => Err(mismatch(other, "uuid")),
        }
    }

    /// Reads as an IP address.
    pub fn as_ip(&self) -> Result<IpAddr, ValueError> {
        match self.non_null()? {
            Value::Ipv4(v) => Ok(IpAddr::V4(*v)),
            Value::Ipv6(v) => Ok(IpAddr::V6(*v)),
            Value::String(s) => parse_str(s, "ip"),
            other => Err(mismatch(other, "ip")),
        }
    }

    /// Borrows the value as an array of values.
    pub fn as_array(&self) -> Result<&'a [Value], ValueError> {
        match self.non_null()? {
            Value::Array(v) => Ok(v),
            other => Err(mismatch(other, "array")),
        }
    }

    /// Borrows the value as tuple elements.
    pub fn as_tuple(&self) -> Result<&'a [Value], ValueError> {
        match self.non_null()? {
            Value::Tuple(v) => Ok(v),
            other => Err(mismatch(other, "tuple")),
        }
    }

    /// Borrows the value as map entries.
    pub fn as_map(&self) -> Result<&'a [(Value, Value)], ValueError> {
        match self.non_null()? {
            Value::Map(v) => Ok(v),
            other => Err(mismatch(other, "map")),
        }
    }

    /// Borrows the opaque bitmap state.
    pub fn as_bitmap(&self) -> Result<&'a Bytes, ValueError> {
        match self.non_null()? {
            Value::Bitmap(v) => Ok(v),
            other => Err(mismatch(other, "bitmap")),
        }
    }

    /// Nullable read: `None` for null instead of an error.
    pub fn opt_i64(&self) -> Result<Option<i64>, ValueError> {
        if self.is_null() {
            return Ok(None);
        }
        self.as_i64().map(Some)
    }

    /// Nullable read of `u64`.
    pub fn opt_u64(&self) -> Result<Option<u64>, ValueError> {
        if self.is_null() {
            return Ok(None);
        }
        self.as_u64().map(Some)
    }

    /// Nullable read of `f64`.
    pub fn opt_f64(&self) -> Result<Option<f64>, ValueError> {
        if self.is_null() {
            return Ok(None);
        }
        self.as_f64().map(Some)
    }

    /// Nullable read of a string.
    pub fn opt_string(&self) -> Result<Option<String>, ValueError> {
        if self.is_null() {
            return Ok(None);
        }
        self.as_string().map(Some)
    }

    /// Nullable read of a date.
    pub fn opt_date(&self) -> Result<Option<NaiveDate>, ValueError> {
        if self.is_null() {
            return Ok(None);
        }
        self.as_date().map(Some)
    }

    /// Nullable read of an instant.
    pub fn opt_datetime(&self) -> Result<Option<DateTime<Utc>>, ValueError> {
        if self.is_null() {
            return Ok(None);
        }
        self.as_datetime().map(Some)
    }
}
