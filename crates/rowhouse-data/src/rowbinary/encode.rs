//! RowBinary encoder.

use bytes::BufMut;

use crate::column::{Column, TypeCategory};
use crate::error::EncodeError;
use crate::value::Value;

use super::{write_leb128, EPOCH_DAYS_FROM_CE};

/// Encodes one value under the given column descriptor.
pub fn encode_value(
    buf: &mut impl BufMut,
    column: &Column,
    value: &Value,
) -> Result<(), EncodeError> {
    let column = column.storage();
    if column.category() == TypeCategory::Nullable {
        if value.is_null() {
            buf.put_u8(1);
            return Ok(());
        }
        buf.put_u8(0);
        return encode_value(buf, &column.children()[0], value);
    }
    if value.is_null() {
        return Err(EncodeError::UnexpectedNull {
            column: label(column),
        });
    }
    match column.category() {
        TypeCategory::Int => encode_int(buf, column, value),
        TypeCategory::UInt => encode_uint(buf, column, value),
        TypeCategory::Float => encode_float(buf, column, value),
        TypeCategory::Decimal => encode_decimal(buf, column, value),
        TypeCategory::Bool => {
            let v = value.to_bool().map_err(|_| type_mismatch(column, value))?;
            buf.put_u8(u8::from(v));
            Ok(())
        }
        TypeCategory::String => {
            let bytes = string_payload(column, value)?;
            write_leb128(buf, bytes.len() as u64);
            buf.put_slice(bytes);
            Ok(())
        }
        TypeCategory::FixedString => {
            let bytes = string_payload(column, value)?;
            let width = column.fixed_length();
            if bytes.len() > width {
                return Err(EncodeError::FixedStringOverflow {
                    column: label(column),
                    width,
                    len: bytes.len(),
                });
            }
            buf.put_slice(bytes);
            buf.put_bytes(0, width - bytes.len());
            Ok(())
        }
        TypeCategory::Date => {
            let days = date_days(column, value)?;
            let days = u16::try_from(days).map_err(|_| range_overflow(column))?;
            buf.put_u16_le(days);
            Ok(())
        }
        TypeCategory::Date32 => {
            let days = date_days(column, value)?;
            buf.put_i32_le(days);
            Ok(())
        }
        TypeCategory::DateTime => {
            let instant = match value {
                Value::DateTime(v) => *v,
                _ => return Err(type_mismatch(column, value)),
            };
            let seconds = u32::try_from(instant.timestamp()).map_err(|_| range_overflow(column))?;
            buf.put_u32_le(seconds);
            Ok(())
        }
        TypeCategory::DateTime64 => {
            let instant = match value {
                Value::DateTime(v) => *v,
                _ => return Err(type_mismatch(column, value)),
            };
            let scale = u32::from(column.scale());
            let per_second = 10i128.pow(scale);
            let per_tick_nanos = 10u32.pow(9 - scale);
            let ticks = i128::from(instant.timestamp()) * per_second
                + i128::from(instant.timestamp_subsec_nanos() / per_tick_nanos);
            let ticks = i64::try_from(ticks).map_err(|_| range_overflow(column))?;
            buf.put_i64_le(ticks);
            Ok(())
        }
        TypeCategory::Uuid => {
            let uuid = match value {
                Value::Uuid(v) => *v,
                _ => return Err(type_mismatch(column, value)),
            };
            // Two little-endian u64 halves of the big-endian RFC layout.
            let bytes = uuid.as_bytes();
            for i in (0..8).rev() {
                buf.put_u8(bytes[i]);
            }
            for i in (8..16).rev() {
                buf.put_u8(bytes[i]);
            }
            Ok(())
        }
        TypeCategory::Ipv4 => {
            let addr = match value {
                Value::Ipv4(v) => *v,
                _ => return Err(type_mismatch(column, value)),
            };
            buf.put_slice(&addr.octets());
            Ok(())
        }
        TypeCategory::Ipv6 => {
            let addr = match value {
                Value::Ipv6(v) => *v,
                _ => return Err(type_mismatch(column, value)),
            };
            buf.put_slice(&addr.octets());
            Ok(())
        }
        TypeCategory::Enum8 | TypeCategory::Enum16 => encode_enum(buf, column, value),
        TypeCategory::Array => {
            let items = match value {
                Value::Array(items) => items,
                _ => return Err(type_mismatch(column, value)),
            };
            write_leb128(buf, items.len() as u64);
            for item in items {
                encode_value(buf, &column.children()[0], item)?;
            }
            Ok(())
        }
        TypeCategory::Tuple => {
            let items = match value {
                Value::Tuple(items) => items,
                _ => return Err(type_mismatch(column, value)),
            };
            if items.len() != column.children().len() {
                return Err(type_mismatch(column, value));
            }
            for (child, item) in column.children().iter().zip(items) {
                encode_value(buf, child, item)?;
            }
            Ok(())
        }
        TypeCategory::Map => {
            let entries = match value {
                Value::Map(entries) => entries,
                _ => return Err(type_mismatch(column, value)),
            };
            write_leb128(buf, entries.len() as u64);
            for (key, val) in entries {
                encode_value(buf, &column.children()[0], key)?;
                encode_value(buf, &column.children()[1], val)?;
            }
            Ok(())
        }
        TypeCategory::Nested => {
            // Wire form of unflattened nested columns: an array of tuples
            // over the named children.
            let rows = match value {
                Value::Array(rows) => rows,
                _ => return Err(type_mismatch(column, value)),
            };
            write_leb128(buf, rows.len() as u64);
            for row in rows {
                let items = match row {
                    Value::Tuple(items) if items.len() == column.children().len() => items,
                    _ => return Err(type_mismatch(column, value)),
                };
                for (child, item) in column.children().iter().zip(items) {
                    encode_value(buf, child, item)?;
                }
            }
            Ok(())
        }
        TypeCategory::AggregateBitmap => {
            let blob = match value {
                Value::Bitmap(b) => &b[..],
                Value::Bytes(b) => &b[..],
                _ => return Err(type_mismatch(column, value)),
            };
            write_leb128(buf, blob.len() as u64);
            buf.put_slice(blob);
            Ok(())
        }
        TypeCategory::Nullable | TypeCategory::LowCardinality => unreachable!("handled above"),
    }
}

fn encode_int(buf: &mut impl BufMut, column: &Column, value: &Value) -> Result<(), EncodeError> {
    match column.width_bits() {
        8 => {
            let v = checked_int(column, value)?;
            let v = i8::try_from(v).map_err(|_| range_overflow(column))?;
            buf.put_i8(v);
        }
        16 => {
            let v = checked_int(column, value)?;
            let v = i16::try_from(v).map_err(|_| range_overflow(column))?;
            buf.put_i16_le(v);
        }
        32 => {
            let v = checked_int(column, value)?;
            let v = i32::try_from(v).map_err(|_| range_overflow(column))?;
            buf.put_i32_le(v);
        }
        64 => {
            let v = checked_int(column, value)?;
            buf.put_i64_le(v);
        }
        128 => {
            let v = value.to_i128().map_err(|e| numeric_error(column, value, e))?;
            buf.put_i128_le(v);
        }
        _ => {
            let v = value.to_i256().map_err(|e| numeric_error(column, value, e))?;
            buf.put_slice(&v.to_le_bytes());
        }
    }
    Ok(())
}

fn encode_uint(buf: &mut impl BufMut, column: &Column, value: &Value) -> Result<(), EncodeError> {
    match column.width_bits() {
        8 => {
            let v = checked_uint(column, value)?;
            let v = u8::try_from(v).map_err(|_| range_overflow(column))?;
            buf.put_u8(v);
        }
        16 => {
            let v = checked_uint(column, value)?;
            let v = u16::try_from(v).map_err(|_| range_overflow(column))?;
            buf.put_u16_le(v);
        }
        32 => {
            let v = checked_uint(column, value)?;
            let v = u32::try_from(v).map_err(|_| range_overflow(column))?;
            buf.put_u32_le(v);
        }
        64 => {
            let v = checked_uint(column, value)?;
            buf.put_u64_le(v);
        }
        128 => {
            let v = value.to_u128().map_err(|e| numeric_error(column, value, e))?;
            buf.put_u128_le(v);
        }
        _ => {
            let v = value.to_u256().map_err(|e| numeric_error(column, value, e))?;
            buf.put_slice(&v.to_le_bytes());
        }
    }
    Ok(())
}

fn encode_float(buf: &mut impl BufMut, column: &Column, value: &Value) -> Result<(), EncodeError> {
    let v = value.to_f64().map_err(|_| type_mismatch(column, value))?;
    if column.width_bits() == 32 {
        buf.put_f32_le(v as f32);
    } else {
        buf.put_f64_le(v);
    }
    Ok(())
}

fn encode_decimal(buf: &mut impl BufMut, column: &Column, value: &Value) -> Result<(), EncodeError> {
    let decimal = value.to_decimal().map_err(|_| type_mismatch(column, value))?;
    let decimal = decimal
        .rescale(column.scale())
        .ok_or_else(|| range_overflow(column))?;
    let unscaled = decimal.unscaled();
    match column.width_bits() {
        32 => {
            let v = unscaled
                .to_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| range_overflow(column))?;
            buf.put_i32_le(v);
        }
        64 => {
            let v = unscaled.to_i64().ok_or_else(|| range_overflow(column))?;
            buf.put_i64_le(v);
        }
        128 => {
            let v = unscaled.to_i128().ok_or_else(|| range_overflow(column))?;
            buf.put_i128_le(v);
        }
        _ => buf.put_slice(&unscaled.to_le_bytes()),
    }
    Ok(())
}

fn encode_enum(buf: &mut impl BufMut, column: &Column, value: &Value) -> Result<(), EncodeError> {
    let discriminant = match value {
        Value::Enum(v) => i64::from(*v),
        Value::String(name) => match column.enum_value(name) {
            Some(v) => i64::from(v),
            None => {
                return Err(EncodeError::TypeMismatch {
                    column: label(column),
                    type_name: column.type_name().to_string(),
                    value_kind: "unknown enum member",
                })
            }
        },
        other => other.to_i64().map_err(|_| type_mismatch(column, value))?,
    };
    let member = i16::try_from(discriminant)
        .ok()
        .filter(|v| column.enum_name(*v).is_some());
    let member = member.ok_or(EncodeError::EnumValueOutOfRange {
        column: label(column),
        value: discriminant,
    })?;
    if column.category() == TypeCategory::Enum8 {
        buf.put_i8(member as i8);
    } else {
        buf.put_i16_le(member);
    }
    Ok(())
}

fn checked_int(column: &Column, value: &Value) -> Result<i64, EncodeError> {
    value.to_i64().map_err(|e| numeric_error(column, value, e))
}

fn checked_uint(column: &Column, value: &Value) -> Result<u64, EncodeError> {
    value.to_u64().map_err(|e| numeric_error(column, value, e))
}

fn numeric_error(
    column: &Column,
    value: &Value,
    error: crate::error::ValueError,
) -> EncodeError {
    match error {
        crate::error::ValueError::Overflow { .. } => range_overflow(column),
        _ => type_mismatch(column, value),
    }
}

fn string_payload<'a>(column: &Column, value: &'a Value) -> Result<&'a [u8], EncodeError> {
    match value {
        Value::String(s) => Ok(s.as_bytes()),
        Value::Bytes(b) => Ok(b),
        other => Err(type_mismatch(column, other)),
    }
}

fn date_days(column: &Column, value: &Value) -> Result<i32, EncodeError> {
    match value {
        Value::Date(date) => Ok(chrono::Datelike::num_days_from_ce(date) - EPOCH_DAYS_FROM_CE),
        _ => Err(type_mismatch(column, value)),
    }
}

fn label(column: &Column) -> String {
    if column.name().is_empty() {
        column.type_name().to_string()
    } else {
        column.name().to_string()
    }
}

fn type_mismatch(column: &Column, value: &Value) -> EncodeError {
    EncodeError::TypeMismatch {
        column: label(column),
        type_name: column.type_name().to_string(),
        value_kind: value.kind(),
    }
}

fn range_overflow(column: &Column) -> EncodeError {
    EncodeError::Overflow {
        column: label(column),
        type_name: column.type_name().to_string(),
    }
}
