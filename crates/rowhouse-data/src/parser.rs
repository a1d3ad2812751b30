//! Parser for server column type strings.
//!
//! Type strings arrive from `DESCRIBE TABLE` and from the in-stream header
//! of `RowBinaryWithNamesAndTypes`, e.g. `Array(Nullable(Decimal(9, 3)))`.
//! Parsing is recursive descent over a small token stream: identifiers,
//! parentheses, commas, integer literals and single-quoted string literals.

use crate::column::{Column, TypeCategory};
use crate::error::SchemaError;

/// Parses a column type string into a descriptor.
pub fn parse_column_type(input: &str) -> Result<Column, SchemaError> {
    let tokens = tokenize(input).map_err(|reason| SchemaError::Parse {
        type_name: input.to_string(),
        reason,
    })?;
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
    };
    let column = parser.parse_type()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("trailing input after type"));
    }
    Ok(column)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(i64),
    Str(String),
    LParen,
    RParen,
    Comma,
    Eq,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => text.push(escaped),
                            None => return Err("unterminated string literal".into()),
                        },
                        Some('\'') => break,
                        Some(other) => text.push(other),
                        None => return Err("unterminated string literal".into()),
                    }
                }
                tokens.push(Token::Str(text));
            }
            '-' | '0'..='9' => {
                let negative = c == '-';
                if negative {
                    chars.next();
                }
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if digits.is_empty() {
                    return Err("expected digits".into());
                }
                let value: i64 = digits.parse().map_err(|_| "integer literal overflow")?;
                tokens.push(Token::Number(if negative { -value } else { value }));
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' || d == '.' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("unexpected character {:?}", other)),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> SchemaError {
        SchemaError::Parse {
            type_name: self.input.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: Token) -> Result<(), SchemaError> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            other => Err(self.error(format!("expected {:?}, found {:?}", token, other))),
        }
    }

    fn expect_number(&mut self) -> Result<i64, SchemaError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            other => Err(self.error(format!("expected integer, found {:?}", other))),
        }
    }

    fn expect_string(&mut self) -> Result<String, SchemaError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(s),
            other => Err(self.error(format!("expected string literal, found {:?}", other))),
        }
    }

    fn parse_type(&mut self) -> Result<Column, SchemaError> {
        let name = match self.next() {
            Some(Token::Ident(name)) => name,
            other => return Err(self.error(format!("expected type name, found {:?}", other))),
        };
        match name.as_str() {
            "Int8" => Ok(int(&name, TypeCategory::Int, 8)),
            "Int16" => Ok(int(&name, TypeCategory::Int, 16)),
            "Int32" => Ok(int(&name, TypeCategory::Int, 32)),
            "Int64" => Ok(int(&name, TypeCategory::Int, 64)),
            "Int128" => Ok(int(&name, TypeCategory::Int, 128)),
            "Int256" => Ok(int(&name, TypeCategory::Int, 256)),
            "UInt8" => Ok(int(&name, TypeCategory::UInt, 8)),
            "UInt16" => Ok(int(&name, TypeCategory::UInt, 16)),
            "UInt32" => Ok(int(&name, TypeCategory::UInt, 32)),
            "UInt64" => Ok(int(&name, TypeCategory::UInt, 64)),
            "UInt128" => Ok(int(&name, TypeCategory::UInt, 128)),
            "UInt256" => Ok(int(&name, TypeCategory::UInt, 256)),
            "Float32" => Ok(int(&name, TypeCategory::Float, 32)),
            "Float64" => Ok(int(&name, TypeCategory::Float, 64)),
            "Bool" => Ok(Column::simple("Bool", TypeCategory::Bool)),
            "String" => Ok(Column::simple("String", TypeCategory::String)),
            "Date" => Ok(Column::simple("Date", TypeCategory::Date)),
            "Date32" => Ok(Column::simple("Date32", TypeCategory::Date32)),
            "UUID" => Ok(Column::simple("UUID", TypeCategory::Uuid)),
            "IPv4" => Ok(Column::simple("IPv4", TypeCategory::Ipv4)),
            "IPv6" => Ok(Column::simple("IPv6", TypeCategory::Ipv6)),
            "DateTime" => self.parse_datetime(),
            "DateTime64" => self.parse_datetime64(),
            "Decimal" => self.parse_decimal(),
            "Decimal32" => self.parse_sized_decimal(9),
            "Decimal64" => self.parse_sized_decimal(18),
            "Decimal128" => self.parse_sized_decimal(38),
            "Decimal256" => self.parse_sized_decimal(76),
            "FixedString" => self.parse_fixed_string(),
            "Enum8" => self.parse_enum(TypeCategory::Enum8),
            "Enum16" => self.parse_enum(TypeCategory::Enum16),
            "Array" => self.parse_array(),
            "Tuple" => self.parse_tuple(),
            "Map" => self.parse_map(),
            "Nested" => self.parse_nested(),
            "Nullable" => self.parse_nullable(),
            "LowCardinality" => self.parse_low_cardinality(),
            "AggregateFunction" => self.parse_aggregate(),
            "SimpleAggregateFunction" => self.parse_simple_aggregate(),
            _ => Err(SchemaError::UnknownType(name)),
        }
    }

    fn parse_datetime(&mut self) -> Result<Column, SchemaError> {
        let mut column = Column::simple("DateTime", TypeCategory::DateTime);
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let tz = self.expect_string()?;
            self.expect(Token::RParen)?;
            column.type_name = format!("DateTime('{}')", tz);
            column.timezone = Some(tz);
        }
        Ok(column)
    }

    fn parse_datetime64(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let scale = self.expect_number()?;
        if !(0..=9).contains(&scale) {
            return Err(self.error("DateTime64 scale must be between 0 and 9"));
        }
        let mut column = Column::simple(String::new(), TypeCategory::DateTime64);
        column.scale = scale as u8;
        if self.peek() == Some(&Token::Comma) {
            self.next();
            column.timezone = Some(self.expect_string()?);
        }
        self.expect(Token::RParen)?;
        column.type_name = match &column.timezone {
            Some(tz) => format!("DateTime64({}, '{}')", scale, tz),
            None => format!("DateTime64({})", scale),
        };
        Ok(column)
    }

    fn parse_decimal(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let precision = self.expect_number()?;
        self.expect(Token::Comma)?;
        let scale = self.expect_number()?;
        self.expect(Token::RParen)?;
        self.make_decimal(precision, scale, format!("Decimal({}, {})", precision, scale))
    }

    fn parse_sized_decimal(&mut self, precision: i64) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let scale = self.expect_number()?;
        self.expect(Token::RParen)?;
        let width = decimal_width(precision);
        self.make_decimal(precision, scale, format!("Decimal{}({})", width, scale))
    }

    fn make_decimal(
        &self,
        precision: i64,
        scale: i64,
        type_name: String,
    ) -> Result<Column, SchemaError> {
        if !(1..=76).contains(&precision) {
            return Err(self.error("decimal precision must be between 1 and 76"));
        }
        if !(0..=precision).contains(&scale) {
            return Err(self.error("decimal scale must be between 0 and the precision"));
        }
        let mut column = Column::simple(type_name, TypeCategory::Decimal);
        column.precision = precision as u8;
        column.scale = scale as u8;
        column.width_bits = decimal_width(precision);
        Ok(column)
    }

    fn parse_fixed_string(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let length = self.expect_number()?;
        self.expect(Token::RParen)?;
        if length < 1 {
            return Err(self.error("FixedString length must be positive"));
        }
        let mut column = Column::simple(format!("FixedString({})", length), TypeCategory::FixedString);
        column.fixed_length = length as usize;
        Ok(column)
    }

    fn parse_enum(&mut self, category: TypeCategory) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let mut members = Vec::new();
        loop {
            let member = self.expect_string()?;
            self.expect(Token::Eq)?;
            let value = self.expect_number()?;
            let in_range = match category {
                TypeCategory::Enum8 => i8::try_from(value).is_ok(),
                _ => i16::try_from(value).is_ok(),
            };
            if !in_range {
                return Err(self.error(format!("enum value {} out of range", value)));
            }
            members.push((member, value as i16));
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                other => return Err(self.error(format!("expected ',' or ')', found {:?}", other))),
            }
        }
        if members.is_empty() {
            return Err(self.error("enum needs at least one member"));
        }
        let rendered: Vec<String> = members
            .iter()
            .map(|(n, v)| format!("'{}' = {}", n.replace('\\', "\\\\").replace('\'', "\\'"), v))
            .collect();
        let kind = if category == TypeCategory::Enum8 { 8 } else { 16 };
        let mut column = Column::simple(format!("Enum{}({})", kind, rendered.join(", ")), category);
        column.width_bits = kind;
        column.enum_members = members;
        Ok(column)
    }

    fn parse_array(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let inner = self.parse_type()?;
        self.expect(Token::RParen)?;
        let mut column = Column::simple(format!("Array({})", inner.type_name), TypeCategory::Array);
        column.children = vec![inner];
        Ok(column)
    }

    fn parse_tuple(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let mut children = Vec::new();
        loop {
            // A tuple element may carry a field name: `Tuple(a Int32, b String)`.
            let element = if self.is_named_element() {
                let name = match self.next() {
                    Some(Token::Ident(name)) => name,
                    _ => unreachable!(),
                };
                self.parse_type()?.with_name(name)
            } else {
                self.parse_type()?
            };
            children.push(element);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                other => return Err(self.error(format!("expected ',' or ')', found {:?}", other))),
            }
        }
        let rendered: Vec<String> = children.iter().map(|c| c.to_string()).collect();
        let mut column = Column::simple(format!("Tuple({})", rendered.join(", ")), TypeCategory::Tuple);
        column.children = children;
        Ok(column)
    }

    fn is_named_element(&self) -> bool {
        matches!(
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)),
            (Some(Token::Ident(_)), Some(Token::Ident(_)))
        )
    }

    fn parse_map(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let key = self.parse_type()?;
        self.expect(Token::Comma)?;
        let value = self.parse_type()?;
        self.expect(Token::RParen)?;
        let mut column = Column::simple(
            format!("Map({}, {})", key.type_name, value.type_name),
            TypeCategory::Map,
        );
        column.children = vec![key, value];
        Ok(column)
    }

    fn parse_nested(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let mut children = Vec::new();
        loop {
            let name = match self.next() {
                Some(Token::Ident(name)) => name,
                other => {
                    return Err(self.error(format!("expected sub-column name, found {:?}", other)))
                }
            };
            children.push(self.parse_type()?.with_name(name));
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                other => return Err(self.error(format!("expected ',' or ')', found {:?}", other))),
            }
        }
        let rendered: Vec<String> = children.iter().map(|c| c.to_string()).collect();
        let mut column =
            Column::simple(format!("Nested({})", rendered.join(", ")), TypeCategory::Nested);
        column.children = children;
        Ok(column)
    }

    fn parse_nullable(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let inner = self.parse_type()?;
        self.expect(Token::RParen)?;
        if !inner.nullable_compatible() {
            return Err(SchemaError::IllegalNullable(inner.type_name));
        }
        let mut column =
            Column::simple(format!("Nullable({})", inner.type_name), TypeCategory::Nullable);
        column.children = vec![inner];
        Ok(column)
    }

    fn parse_low_cardinality(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let inner = self.parse_type()?;
        self.expect(Token::RParen)?;
        if !inner.low_cardinality_compatible() {
            return Err(SchemaError::IllegalLowCardinality(inner.type_name));
        }
        let mut column = Column::simple(
            format!("LowCardinality({})", inner.type_name),
            TypeCategory::LowCardinality,
        );
        column.children = vec![inner];
        Ok(column)
    }

    fn parse_aggregate(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        let function = match self.next() {
            Some(Token::Ident(name)) => name,
            other => {
                return Err(self.error(format!("expected aggregate function, found {:?}", other)))
            }
        };
        if function != "groupBitmap" {
            return Err(SchemaError::UnknownType(format!(
                "AggregateFunction({}, ...)",
                function
            )));
        }
        self.expect(Token::Comma)?;
        let inner = self.parse_type()?;
        self.expect(Token::RParen)?;
        let mut column = Column::simple(
            format!("AggregateFunction(groupBitmap, {})", inner.type_name),
            TypeCategory::AggregateBitmap,
        );
        column.children = vec![inner];
        Ok(column)
    }

    // SimpleAggregateFunction stores plain values of the inner type; the
    // wrapper is transparent on the wire.
    fn parse_simple_aggregate(&mut self) -> Result<Column, SchemaError> {
        self.expect(Token::LParen)?;
        match self.next() {
            Some(Token::Ident(_)) => {}
            other => {
                return Err(self.error(format!("expected aggregate function, found {:?}", other)))
            }
        }
        self.expect(Token::Comma)?;
        let inner = self.parse_type()?;
        self.expect(Token::RParen)?;
        Ok(inner)
    }
}

fn int(name: &str, category: TypeCategory, width: u16) -> Column {
    let mut column = Column::simple(name, category);
    column.width_bits = width;
    column
}

fn decimal_width(precision: i64) -> u16 {
    match precision {
        ..=9 => 32,
        ..=18 => 64,
        ..=38 => 128,
        _ => 256,
    }
}
