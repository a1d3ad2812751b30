//! Error types for the data layer.

use thiserror::Error;

/// Errors raised while parsing column types or resolving table schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The type string could not be parsed.
    #[error("cannot parse type {type_name:?}: {reason}")]
    Parse {
        /// The offending type string.
        type_name: String,
        /// What went wrong.
        reason: String,
    },

    /// The outer type name is not a known column type.
    #[error("unknown column type {0:?}")]
    UnknownType(String),

    /// Nullable cannot wrap the given inner type.
    #[error("Nullable cannot wrap {0}")]
    IllegalNullable(String),

    /// LowCardinality is restricted to string, fixed-string, numeric and
    /// date inner types.
    #[error("LowCardinality cannot wrap {0}")]
    IllegalLowCardinality(String),

    /// The named column does not exist in the schema.
    #[error("unknown column {0:?}")]
    UnknownColumn(String),
}

/// Errors raised while encoding values to RowBinary.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A null payload was supplied for a non-nullable column.
    #[error("null value for non-nullable column {column:?}")]
    UnexpectedNull {
        /// Column that rejected the value.
        column: String,
    },

    /// The supplied value is longer than the FixedString width.
    #[error("value of {len} bytes exceeds FixedString({width}) in column {column:?}")]
    FixedStringOverflow {
        /// Column that rejected the value.
        column: String,
        /// Declared width.
        width: usize,
        /// Actual value length.
        len: usize,
    },

    /// A required column was left unset at commit time.
    #[error("no value for non-nullable column {column:?}")]
    MissingRequired {
        /// Column that was left unset.
        column: String,
    },

    /// The enum value is not one of the declared members.
    #[error("value {value} is not a member of enum column {column:?}")]
    EnumValueOutOfRange {
        /// Column that rejected the value.
        column: String,
        /// The out-of-range value.
        value: i64,
    },

    /// The supplied value cannot be represented in the column type.
    #[error("cannot encode {value_kind} into column {column:?} of type {type_name}")]
    TypeMismatch {
        /// Column that rejected the value.
        column: String,
        /// Declared column type.
        type_name: String,
        /// Kind of the supplied value.
        value_kind: &'static str,
    },

    /// The value is out of range for the column width.
    #[error("value out of range for column {column:?} of type {type_name}")]
    Overflow {
        /// Column that rejected the value.
        column: String,
        /// Declared column type.
        type_name: String,
    },

    /// The writer only supports the row-oriented binary formats.
    #[error("unsupported output format {0}")]
    UnsupportedFormat(String),
}

/// Errors raised while decoding RowBinary input.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input ended in the middle of a value.
    #[error("unexpected end of input while decoding {0}")]
    UnexpectedEof(&'static str),

    /// A string field contained invalid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// A decoded enum discriminant has no declared member.
    #[error("unknown enum value {value} for column {column:?}")]
    UnknownEnumValue {
        /// Column being decoded.
        column: String,
        /// The unmatched discriminant.
        value: i64,
    },

    /// A decoded field carries an invalid payload.
    #[error("invalid value while decoding {what}: {reason}")]
    InvalidValue {
        /// Which field kind was being decoded.
        what: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

/// Errors raised by typed value accessors.
#[derive(Debug, Error)]
pub enum ValueError {
    /// The value is null and a concrete type was requested.
    #[error("value is null")]
    Null,

    /// The value does not fit in the requested type.
    #[error("value {value} does not fit in {target}")]
    Overflow {
        /// Canonical rendering of the value.
        value: String,
        /// Requested target type.
        target: &'static str,
    },

    /// The value kind cannot convert to the requested type.
    #[error("cannot read {value_kind} as {target}")]
    TypeMismatch {
        /// Kind of the stored value.
        value_kind: &'static str,
        /// Requested target type.
        target: &'static str,
    },

    /// A string value could not be parsed into the requested type.
    #[error("cannot parse {value:?} as {target}")]
    InvalidString {
        /// The string that failed to parse.
        value: String,
        /// Requested target type.
        target: &'static str,
    },
}
