//! RowBinary decoder.

use std::sync::Arc;

use bytes::Buf;
use chrono::{DateTime, NaiveDate};

use crate::column::{Column, TypeCategory};
use crate::decimal::Decimal;
use crate::error::DecodeError;
use crate::int256::{I256, U256};
use crate::schema::TableSchema;
use crate::value::{Record, Value};

use super::{ensure, read_leb128, EPOCH_DAYS_FROM_CE};

/// Decodes one value under the given column descriptor.
pub fn decode_value(buf: &mut impl Buf, column: &Column) -> Result<Value, DecodeError> {
    let column = column.storage();
    match column.category() {
        TypeCategory::Nullable => {
            ensure(buf, 1, "null flag")?;
            match buf.get_u8() {
                1 => Ok(Value::Null),
                0 => decode_value(buf, &column.children()[0]),
                other => Err(DecodeError::InvalidValue {
                    what: "null flag",
                    reason: format!("unexpected tag {}", other),
                }),
            }
        }
        TypeCategory::Int => decode_int(buf, column),
        TypeCategory::UInt => decode_uint(buf, column),
        TypeCategory::Float => {
            if column.width_bits() == 32 {
                ensure(buf, 4, "Float32")?;
                Ok(Value::Float32(buf.get_f32_le()))
            } else {
                ensure(buf, 8, "Float64")?;
                Ok(Value::Float64(buf.get_f64_le()))
            }
        }
        TypeCategory::Decimal => decode_decimal(buf, column),
        TypeCategory::Bool => {
            ensure(buf, 1, "Bool")?;
            match buf.get_u8() {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                other => Err(DecodeError::InvalidValue {
                    what: "Bool",
                    reason: format!("unexpected byte {}", other),
                }),
            }
        }
        TypeCategory::String => {
            let len = read_leb128(buf)? as usize;
            ensure(buf, len, "String")?;
            let bytes = buf.copy_to_bytes(len);
            match std::str::from_utf8(&bytes) {
                Ok(s) => Ok(Value::String(s.to_string())),
                Err(_) => Ok(Value::Bytes(bytes)),
            }
        }
        TypeCategory::FixedString => {
            let width = column.fixed_length();
            ensure(buf, width, "FixedString")?;
            let bytes = buf.copy_to_bytes(width);
            let trimmed_len = width - bytes.iter().rev().take_while(|&&b| b == 0).count();
            match std::str::from_utf8(&bytes[..trimmed_len]) {
                Ok(s) => Ok(Value::String(s.to_string())),
                Err(_) => Ok(Value::Bytes(bytes)),
            }
        }
        TypeCategory::Date => {
            ensure(buf, 2, "Date")?;
            let days = i32::from(buf.get_u16_le());
            Ok(Value::Date(date_from_days(days)?))
        }
        TypeCategory::Date32 => {
            ensure(buf, 4, "Date32")?;
            let days = buf.get_i32_le();
            Ok(Value::Date(date_from_days(days)?))
        }
        TypeCategory::DateTime => {
            ensure(buf, 4, "DateTime")?;
            let seconds = i64::from(buf.get_u32_le());
            let instant = DateTime::from_timestamp(seconds, 0).ok_or(DecodeError::InvalidValue {
                what: "DateTime",
                reason: format!("timestamp {} out of range", seconds),
            })?;
            Ok(Value::DateTime(instant))
        }
        TypeCategory::DateTime64 => {
            ensure(buf, 8, "DateTime64")?;
            let ticks = buf.get_i64_le();
            let per_second = 10i64.pow(u32::from(column.scale()));
            let per_tick_nanos = 10u32.pow(9 - u32::from(column.scale()));
            let seconds = ticks.div_euclid(per_second);
            let nanos = (ticks.rem_euclid(per_second) as u32) * per_tick_nanos;
            let instant =
                DateTime::from_timestamp(seconds, nanos).ok_or(DecodeError::InvalidValue {
                    what: "DateTime64",
                    reason: format!("tick count {} out of range", ticks),
                })?;
            Ok(Value::DateTime(instant))
        }
        TypeCategory::Uuid => {
            ensure(buf, 16, "UUID")?;
            let mut wire = [0u8; 16];
            buf.copy_to_slice(&mut wire);
            // Undo the two little-endian u64 halves back to RFC layout.
            let mut bytes = [0u8; 16];
            for i in 0..8 {
                bytes[i] = wire[7 - i];
                bytes[8 + i] = wire[15 - i];
            }
            Ok(Value::Uuid(uuid::Uuid::from_bytes(bytes)))
        }
        TypeCategory::Ipv4 => {
            ensure(buf, 4, "IPv4")?;
            let mut octets = [0u8; 4];
            buf.copy_to_slice(&mut octets);
            Ok(Value::Ipv4(octets.into()))
        }
        TypeCategory::Ipv6 => {
            ensure(buf, 16, "IPv6")?;
            let mut octets = [0u8; 16];
            buf.copy_to_slice(&mut octets);
            Ok(Value::Ipv6(octets.into()))
        }
        TypeCategory::Enum8 => {
            ensure(buf, 1, "Enum8")?;
            decode_enum(column, i16::from(buf.get_i8()))
        }
        TypeCategory::Enum16 => {
            ensure(buf, 2, "Enum16")?;
            decode_enum(column, buf.get_i16_le())
        }
        TypeCategory::Array => {
            let len = read_leb128(buf)? as usize;
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(decode_value(buf, &column.children()[0])?);
            }
            Ok(Value::Array(items))
        }
        TypeCategory::Tuple => {
            let mut items = Vec::with_capacity(column.children().len());
            for child in column.children() {
                items.push(decode_value(buf, child)?);
            }
            Ok(Value::Tuple(items))
        }
        TypeCategory::Map => {
            let len = read_leb128(buf)? as usize;
            let mut entries = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                let key = decode_value(buf, &column.children()[0])?;
                let value = decode_value(buf, &column.children()[1])?;
                entries.push((key, value));
            }
            Ok(Value::Map(entries))
        }
        TypeCategory::Nested => {
            let len = read_leb128(buf)? as usize;
            let mut rows = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                let mut items = Vec::with_capacity(column.children().len());
                for child in column.children() {
                    items.push(decode_value(buf, child)?);
                }
                rows.push(Value::Tuple(items));
            }
            Ok(Value::Array(rows))
        }
        TypeCategory::AggregateBitmap => {
            let len = read_leb128(buf)? as usize;
            ensure(buf, len, "bitmap")?;
            Ok(Value::Bitmap(buf.copy_to_bytes(len)))
        }
        TypeCategory::LowCardinality => unreachable!("stripped by storage()"),
    }
}

fn decode_int(buf: &mut impl Buf, column: &Column) -> Result<Value, DecodeError> {
    Ok(match column.width_bits() {
        8 => {
            ensure(buf, 1, "Int8")?;
            Value::Int8(buf.get_i8())
        }
        16 => {
            ensure(buf, 2, "Int16")?;
            Value::Int16(buf.get_i16_le())
        }
        32 => {
            ensure(buf, 4, "Int32")?;
            Value::Int32(buf.get_i32_le())
        }
        64 => {
            ensure(buf, 8, "Int64")?;
            Value::Int64(buf.get_i64_le())
        }
        128 => {
            ensure(buf, 16, "Int128")?;
            Value::Int128(buf.get_i128_le())
        }
        _ => {
            ensure(buf, 32, "Int256")?;
            let mut bytes = [0u8; 32];
            buf.copy_to_slice(&mut bytes);
            Value::Int256(I256::from_le_bytes(bytes))
        }
    })
}

fn decode_uint(buf: &mut impl Buf, column: &Column) -> Result<Value, DecodeError> {
    Ok(match column.width_bits() {
        8 => {
            ensure(buf, 1, "UInt8")?;
            Value::UInt8(buf.get_u8())
        }
        16 => {
            ensure(buf, 2, "UInt16")?;
            Value::UInt16(buf.get_u16_le())
        }
        32 => {
            ensure(buf, 4, "UInt32")?;
            Value::UInt32(buf.get_u32_le())
        }
        64 => {
            ensure(buf, 8, "UInt64")?;
            Value::UInt64(buf.get_u64_le())
        }
        128 => {
            ensure(buf, 16, "UInt128")?;
            Value::UInt128(buf.get_u128_le())
        }
        _ => {
            ensure(buf, 32, "UInt256")?;
            let mut bytes = [0u8; 32];
            buf.copy_to_slice(&mut bytes);
            Value::UInt256(U256::from_le_bytes(bytes))
        }
    })
}

fn decode_decimal(buf: &mut impl Buf, column: &Column) -> Result<Value, DecodeError> {
    let unscaled = match column.width_bits() {
        32 => {
            ensure(buf, 4, "Decimal32")?;
            I256::from(i64::from(buf.get_i32_le()))
        }
        64 => {
            ensure(buf, 8, "Decimal64")?;
            I256::from(buf.get_i64_le())
        }
        128 => {
            ensure(buf, 16, "Decimal128")?;
            I256::from(buf.get_i128_le())
        }
        _ => {
            ensure(buf, 32, "Decimal256")?;
            let mut bytes = [0u8; 32];
            buf.copy_to_slice(&mut bytes);
            I256::from_le_bytes(bytes)
        }
    };
    Ok(Value::Decimal(Decimal::new(unscaled, column.scale())))
}

fn decode_enum(column: &Column, value: i16) -> Result<Value, DecodeError> {
    if column.enum_name(value).is_none() {
        return Err(DecodeError::UnknownEnumValue {
            column: column.name().to_string(),
            value: i64::from(value),
        });
    }
    Ok(Value::Enum(value))
}

fn date_from_days(days: i32) -> Result<NaiveDate, DecodeError> {
    NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE).ok_or(
        DecodeError::InvalidValue {
            what: "Date",
            reason: format!("day number {} out of range", days),
        },
    )
}

/// Streaming row decoder bound to a schema.
///
/// [`RowDecoder::read_row`] allocates a fresh [`Record`];
/// [`RowDecoder::read_row_into`] overwrites an existing record's slots so a
/// cursor can recycle one record across rows.
#[derive(Debug, Clone)]
pub struct RowDecoder {
    schema: Arc<TableSchema>,
}

impl RowDecoder {
    /// Creates a decoder for the given schema.
    pub fn new(schema: Arc<TableSchema>) -> RowDecoder {
        RowDecoder { schema }
    }

    /// The schema rows are decoded against.
    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Decodes one row into a fresh record.
    pub fn read_row(&self, buf: &mut impl Buf) -> Result<Record, DecodeError> {
        let mut values = Vec::with_capacity(self.schema.len());
        for column in self.schema.wire_columns() {
            values.push(decode_value(buf, column)?);
        }
        Ok(Record::new(Arc::clone(&self.schema), values))
    }

    /// Decodes one row over an existing record, reusing its storage.
    pub fn read_row_into(&self, buf: &mut impl Buf, record: &mut Record) -> Result<(), DecodeError> {
        let values = record.values_mut();
        values.clear();
        for column in self.schema.wire_columns() {
            values.push(decode_value(buf, column)?);
        }
        Ok(())
    }

    /// Creates an empty record sized for this schema, for use with
    /// [`RowDecoder::read_row_into`].
    pub fn empty_record(&self) -> Record {
        Record::new(
            Arc::clone(&self.schema),
            Vec::with_capacity(self.schema.len()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_column_type;
    use crate::rowbinary::encode_value;
    use bytes::BytesMut;
    use chrono::TimeZone;
    use chrono::Utc;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn roundtrip(type_name: &str, value: Value) -> Value {
        let column = parse_column_type(type_name).unwrap();
        let mut buf = BytesMut::new();
        encode_value(&mut buf, &column, &value).unwrap();
        let mut slice = &buf[..];
        let decoded = decode_value(&mut slice, &column).unwrap();
        assert!(slice.is_empty(), "decoder left {} bytes", slice.len());
        decoded
    }

    #[test]
    fn test_integer_roundtrips() {
        assert_eq!(roundtrip("Int8", Value::Int8(-5)), Value::Int8(-5));
        assert_eq!(roundtrip("Int64", Value::Int64(i64::MIN)), Value::Int64(i64::MIN));
        assert_eq!(
            roundtrip("Int128", Value::Int128(i128::MAX)),
            Value::Int128(i128::MAX)
        );
        assert_eq!(
            roundtrip("Int256", Value::Int256(I256::from_i128(-42))),
            Value::Int256(I256::from_i128(-42))
        );
        assert_eq!(roundtrip("UInt16", Value::UInt16(65535)), Value::UInt16(65535));
        assert_eq!(
            roundtrip("UInt256", Value::UInt256(U256::from_u128(u128::MAX))),
            Value::UInt256(U256::from_u128(u128::MAX))
        );
    }

    #[test]
    fn test_widening_on_encode() {
        // An Int32 payload into an Int64 column widens.
        assert_eq!(roundtrip("Int64", Value::Int32(7)), Value::Int64(7));
    }

    #[test]
    fn test_float_string_bool_roundtrips() {
        assert_eq!(roundtrip("Float64", Value::Float64(0.25)), Value::Float64(0.25));
        assert_eq!(roundtrip("Float32", Value::Float32(1.5)), Value::Float32(1.5));
        assert_eq!(roundtrip("Bool", Value::Bool(true)), Value::Bool(true));
        assert_eq!(
            roundtrip("String", Value::String("héllo".to_string())),
            Value::String("héllo".to_string())
        );
        assert_eq!(
            roundtrip("String", Value::String(String::new())),
            Value::String(String::new())
        );
    }

    #[test]
    fn test_fixed_string_padding() {
        let column = parse_column_type("FixedString(5)").unwrap();
        let mut buf = BytesMut::new();
        encode_value(&mut buf, &column, &Value::String("ab".to_string())).unwrap();
        assert_eq!(&buf[..], b"ab\0\0\0");
        let mut slice = &buf[..];
        assert_eq!(
            decode_value(&mut slice, &column).unwrap(),
            Value::String("ab".to_string())
        );

        let err = encode_value(&mut buf, &column, &Value::String("toolong".to_string()));
        assert!(matches!(
            err,
            Err(crate::error::EncodeError::FixedStringOverflow { width: 5, len: 7, .. })
        ));
    }

    #[test]
    fn test_temporal_roundtrips() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(roundtrip("Date", Value::Date(date)), Value::Date(date));
        assert_eq!(roundtrip("Date32", Value::Date(date)), Value::Date(date));

        let early = NaiveDate::from_ymd_opt(1931, 6, 1).unwrap();
        assert_eq!(roundtrip("Date32", Value::Date(early)), Value::Date(early));

        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            roundtrip("DateTime", Value::DateTime(instant)),
            Value::DateTime(instant)
        );

        let precise = instant + chrono::Duration::milliseconds(123);
        assert_eq!(
            roundtrip("DateTime64(3)", Value::DateTime(precise)),
            Value::DateTime(precise)
        );
        assert_eq!(
            roundtrip("DateTime64(9, 'UTC')", Value::DateTime(precise)),
            Value::DateTime(precise)
        );
    }

    #[test]
    fn test_uuid_wire_layout() {
        let uuid = uuid::Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let column = parse_column_type("UUID").unwrap();
        let mut buf = BytesMut::new();
        encode_value(&mut buf, &column, &Value::Uuid(uuid)).unwrap();
        // High half reversed, then low half reversed.
        assert_eq!(
            &buf[..],
            &[
                0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0x00, 0xFF, 0xEE, 0xDD, 0xCC, 0xBB,
                0xAA, 0x99, 0x88
            ]
        );
        let mut slice = &buf[..];
        assert_eq!(decode_value(&mut slice, &column).unwrap(), Value::Uuid(uuid));
    }

    #[test]
    fn test_ip_roundtrips() {
        let v4 = Ipv4Addr::new(10, 20, 30, 40);
        assert_eq!(roundtrip("IPv4", Value::Ipv4(v4)), Value::Ipv4(v4));

        let v6: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert_eq!(roundtrip("IPv6", Value::Ipv6(v6)), Value::Ipv6(v6));
    }

    #[test]
    fn test_ipv4_network_order() {
        let column = parse_column_type("IPv4").unwrap();
        let mut buf = BytesMut::new();
        encode_value(&mut buf, &column, &Value::Ipv4(Ipv4Addr::new(1, 2, 3, 4))).unwrap();
        assert_eq!(&buf[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_enum_roundtrip_and_validation() {
        assert_eq!(
            roundtrip("Enum8('a' = 1, 'b' = 2)", Value::Enum(2)),
            Value::Enum(2)
        );
        assert_eq!(
            roundtrip("Enum16('x' = -300)", Value::String("x".to_string())),
            Value::Enum(-300)
        );

        let column = parse_column_type("Enum8('a' = 1)").unwrap();
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_value(&mut buf, &column, &Value::Enum(9)),
            Err(crate::error::EncodeError::EnumValueOutOfRange { value: 9, .. })
        ));

        let mut slice = &[9u8][..];
        assert!(matches!(
            decode_value(&mut slice, &column),
            Err(DecodeError::UnknownEnumValue { value: 9, .. })
        ));
    }

    #[test]
    fn test_decimal_roundtrip() {
        let value = Value::Decimal(Decimal::new(12345i64, 3));
        assert_eq!(roundtrip("Decimal(9, 3)", value.clone()), value);
        assert_eq!(roundtrip("Decimal64(3)", value.clone()), value);
        assert_eq!(roundtrip("Decimal128(3)", value.clone()), value);
        assert_eq!(roundtrip("Decimal256(3)", value.clone()), value);

        // A coarser payload is rescaled to the column scale.
        assert_eq!(
            roundtrip("Decimal64(3)", Value::Decimal(Decimal::new(5i64, 1))),
            Value::Decimal(Decimal::new(500i64, 3))
        );
    }

    #[test]
    fn test_nested_composite_roundtrip() {
        let value = Value::Array(vec![
            Value::Int32(1),
            Value::Null,
            Value::Int32(7),
        ]);
        assert_eq!(roundtrip("Array(Nullable(Int32))", value.clone()), value);

        let value = Value::Map(vec![
            (Value::String("a".to_string()), Value::UInt8(1)),
            (Value::String("b".to_string()), Value::UInt8(2)),
        ]);
        assert_eq!(roundtrip("Map(String, UInt8)", value.clone()), value);

        let value = Value::Tuple(vec![Value::UInt8(3), Value::String("t".to_string())]);
        assert_eq!(roundtrip("Tuple(UInt8, String)", value.clone()), value);

        let value = Value::Array(vec![Value::Array(vec![Value::UInt8(1), Value::UInt8(2)])]);
        assert_eq!(roundtrip("Array(Array(UInt8))", value.clone()), value);
    }

    #[test]
    fn test_nested_columns_as_array_of_tuples() {
        let value = Value::Array(vec![
            Value::Tuple(vec![Value::UInt64(1), Value::String("x".to_string())]),
            Value::Tuple(vec![Value::UInt64(2), Value::String("y".to_string())]),
        ]);
        assert_eq!(
            roundtrip("Nested(id UInt64, tag String)", value.clone()),
            value
        );
    }

    #[test]
    fn test_low_cardinality_transparent() {
        let value = Value::String("dict".to_string());
        let column = parse_column_type("LowCardinality(String)").unwrap();
        let plain = parse_column_type("String").unwrap();
        let mut buf_lc = BytesMut::new();
        let mut buf_plain = BytesMut::new();
        encode_value(&mut buf_lc, &column, &value).unwrap();
        encode_value(&mut buf_plain, &plain, &value).unwrap();
        assert_eq!(buf_lc, buf_plain);
    }

    #[test]
    fn test_bitmap_blob_roundtrip() {
        let blob = bytes::Bytes::from_static(&[0x00, 0x01, 0x02, 0x03]);
        let value = Value::Bitmap(blob);
        assert_eq!(
            roundtrip("AggregateFunction(groupBitmap, UInt32)", value.clone()),
            value
        );
    }

    #[test]
    fn test_nullable_first_byte() {
        let column = parse_column_type("Nullable(Int32)").unwrap();
        let mut buf = BytesMut::new();
        encode_value(&mut buf, &column, &Value::Null).unwrap();
        assert_eq!(&buf[..], &[1]);

        let mut buf = BytesMut::new();
        encode_value(&mut buf, &column, &Value::Int32(3)).unwrap();
        assert_eq!(buf[0], 0);
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_null_into_non_nullable() {
        let column = parse_column_type("Int32").unwrap();
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_value(&mut buf, &column, &Value::Null),
            Err(crate::error::EncodeError::UnexpectedNull { .. })
        ));
    }

    #[test]
    fn test_truncated_input() {
        let column = parse_column_type("Int64").unwrap();
        let mut slice = &[0u8; 3][..];
        assert!(matches!(
            decode_value(&mut slice, &column),
            Err(DecodeError::UnexpectedEof(_))
        ));

        let column = parse_column_type("String").unwrap();
        let mut slice = &[5u8, b'a'][..];
        assert!(matches!(
            decode_value(&mut slice, &column),
            Err(DecodeError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_row_decoder_reuse() {
        let schema = Arc::new(TableSchema::new(vec![
            parse_column_type("UInt64").unwrap().with_name("a"),
            parse_column_type("String").unwrap().with_name("b"),
        ]));
        let decoder = RowDecoder::new(Arc::clone(&schema));

        let mut buf = BytesMut::new();
        for (a, b) in [(1u64, "one"), (2, "two")] {
            encode_value(&mut buf, schema.column(0).unwrap(), &Value::UInt64(a)).unwrap();
            encode_value(&mut buf, schema.column(1).unwrap(), &Value::from(b)).unwrap();
        }

        let mut slice = &buf[..];
        let mut record = decoder.empty_record();
        decoder.read_row_into(&mut slice, &mut record).unwrap();
        assert_eq!(record.field("a").unwrap().as_u64().unwrap(), 1);
        decoder.read_row_into(&mut slice, &mut record).unwrap();
        assert_eq!(record.field("b").unwrap().as_str().unwrap(), "two");
        assert!(slice.is_empty());
    }

    #[test]
    fn test_spec_row_byte_length() {
        // (a UInt64, b Array(Nullable(Int32)), c Decimal64(3)) with
        // (42, [1, null, 7], 12.345) must occupy exactly
        // 8 + 1 + (1+4) + (1+0) + (1+4) + 8 bytes.
        let schema = Arc::new(TableSchema::new(vec![
            parse_column_type("UInt64").unwrap().with_name("a"),
            parse_column_type("Array(Nullable(Int32))").unwrap().with_name("b"),
            parse_column_type("Decimal64(3)").unwrap().with_name("c"),
        ]));
        let mut buf = BytesMut::new();
        encode_value(&mut buf, schema.column(0).unwrap(), &Value::UInt64(42)).unwrap();
        encode_value(
            &mut buf,
            schema.column(1).unwrap(),
            &Value::Array(vec![Value::Int32(1), Value::Null, Value::Int32(7)]),
        )
        .unwrap();
        encode_value(
            &mut buf,
            schema.column(2).unwrap(),
            &Value::Decimal(Decimal::new(12345i64, 3)),
        )
        .unwrap();
        assert_eq!(buf.len(), 8 + 1 + (1 + 4) + 1 + (1 + 4) + 8);

        let decoder = RowDecoder::new(Arc::clone(&schema));
        let mut slice = &buf[..];
        let record = decoder.read_row(&mut slice).unwrap();
        assert_eq!(record.field("a").unwrap().as_u64().unwrap(), 42);
        assert_eq!(
            record.field("c").unwrap().as_decimal().unwrap(),
            Decimal::new(12345i64, 3)
        );
        let items = record.field("b").unwrap();
        let items = items.as_array().unwrap();
        assert_eq!(items[0], Value::Int32(1));
        assert_eq!(items[1], Value::Null);
    }
}
