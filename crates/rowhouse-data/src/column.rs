//! Column descriptors.
//!
//! A [`Column`] is the parsed form of a server column: its name, its type
//! category with all category-specific attributes, and its default kind as
//! reported by `DESCRIBE TABLE`.

use std::fmt;

/// How a column acquires a value when the insert omits one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultKind {
    /// No default clause.
    #[default]
    None,
    /// `DEFAULT expr` — the server fills omitted values.
    Default,
    /// `MATERIALIZED expr` — computed by the server, never written.
    Materialized,
    /// `ALIAS expr` — a read-only synonym, never written.
    Alias,
    /// `EPHEMERAL` — input-only helper, never stored.
    Ephemeral,
}

impl DefaultKind {
    /// Parses the `default_type` field of a `DESCRIBE TABLE` row.
    pub fn from_describe(text: &str) -> DefaultKind {
        match text {
            "DEFAULT" => DefaultKind::Default,
            "MATERIALIZED" => DefaultKind::Materialized,
            "ALIAS" => DefaultKind::Alias,
            "EPHEMERAL" => DefaultKind::Ephemeral,
            _ => DefaultKind::None,
        }
    }

    /// True for columns the server computes itself; these never appear in
    /// row-binary payloads.
    pub fn is_generated(self) -> bool {
        matches!(
            self,
            DefaultKind::Materialized | DefaultKind::Alias | DefaultKind::Ephemeral
        )
    }
}

/// The category a column type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// Signed integer, 8 to 256 bits.
    Int,
    /// Unsigned integer, 8 to 256 bits.
    UInt,
    /// IEEE-754 binary float, 32 or 64 bits.
    Float,
    /// Fixed-point decimal.
    Decimal,
    /// Single-byte boolean.
    Bool,
    /// Variable-length byte string.
    String,
    /// Fixed-width byte string.
    FixedString,
    /// Days since the epoch as u16.
    Date,
    /// Days since the epoch as i32.
    Date32,
    /// Seconds since the epoch as u32.
    DateTime,
    /// Sub-second instant as i64 ticks.
    DateTime64,
    /// 128-bit UUID.
    Uuid,
    /// IPv4 address.
    Ipv4,
    /// IPv6 address.
    Ipv6,
    /// 8-bit enumeration.
    Enum8,
    /// 16-bit enumeration.
    Enum16,
    /// Variable-length array of one child type.
    Array,
    /// Fixed-arity tuple.
    Tuple,
    /// Key/value map.
    Map,
    /// Named sub-columns, wire-equivalent to an array of tuples.
    Nested,
    /// Nullability wrapper over exactly one child.
    Nullable,
    /// Dictionary wrapper; wire-identical to its child.
    LowCardinality,
    /// Opaque serialized roaring bitmap state.
    AggregateBitmap,
}

/// Parsed metadata of a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) category: TypeCategory,
    pub(crate) children: Vec<Column>,
    pub(crate) width_bits: u16,
    pub(crate) precision: u8,
    pub(crate) scale: u8,
    pub(crate) timezone: Option<String>,
    pub(crate) enum_members: Vec<(String, i16)>,
    pub(crate) fixed_length: usize,
    pub(crate) default_kind: DefaultKind,
}

impl Column {
    pub(crate) fn simple(type_name: impl Into<String>, category: TypeCategory) -> Column {
        Column {
            name: String::new(),
            type_name: type_name.into(),
            category,
            children: Vec::new(),
            width_bits: 0,
            precision: 0,
            scale: 0,
            timezone: None,
            enum_members: Vec::new(),
            fixed_length: 0,
            default_kind: DefaultKind::None,
        }
    }

    /// The column name; empty for anonymous descriptors such as array
    /// elements.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical type name, e.g. `Array(Nullable(Int32))`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The type category.
    pub fn category(&self) -> TypeCategory {
        self.category
    }

    /// Child descriptors of composite categories.
    pub fn children(&self) -> &[Column] {
        &self.children
    }

    /// Integer/float/decimal width in bits.
    pub fn width_bits(&self) -> u16 {
        self.width_bits
    }

    /// Declared decimal precision.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Decimal or DateTime64 scale.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Timezone attached to a DateTime/DateTime64 column, if any.
    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    /// Declared enum members in declaration order.
    pub fn enum_members(&self) -> &[(String, i16)] {
        &self.enum_members
    }

    /// FixedString width in bytes.
    pub fn fixed_length(&self) -> usize {
        self.fixed_length
    }

    /// How the column defaults when omitted on insert.
    pub fn default_kind(&self) -> DefaultKind {
        self.default_kind
    }

    /// Renames the descriptor.
    pub fn with_name(mut self, name: impl Into<String>) -> Column {
        self.name = name.into();
        self
    }

    /// Attaches a default kind.
    pub fn with_default_kind(mut self, kind: DefaultKind) -> Column {
        self.default_kind = kind;
        self
    }

    /// True if the column accepts nulls.
    pub fn is_nullable(&self) -> bool {
        self.category == TypeCategory::Nullable
    }

    /// The descriptor that defines the wire encoding: strips the
    /// LowCardinality wrapper, which has no row-binary footprint.
    pub fn storage(&self) -> &Column {
        if self.category == TypeCategory::LowCardinality {
            &self.children[0]
        } else {
            self
        }
    }

    /// Follows Nullable and LowCardinality wrappers down to the descriptor
    /// that defines the value semantics (enum members, timezone, widths).
    pub fn innermost(&self) -> &Column {
        let mut column = self;
        while matches!(
            column.category,
            TypeCategory::Nullable | TypeCategory::LowCardinality
        ) {
            column = &column.children[0];
        }
        column
    }

    /// Looks up an enum member by discriminant.
    pub fn enum_name(&self, value: i16) -> Option<&str> {
        self.enum_members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    /// Looks up an enum discriminant by member name.
    pub fn enum_value(&self, name: &str) -> Option<i16> {
        self.enum_members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// True for categories LowCardinality may wrap.
    pub(crate) fn low_cardinality_compatible(&self) -> bool {
        matches!(
            self.category,
            TypeCategory::String
                | TypeCategory::FixedString
                | TypeCategory::Int
                | TypeCategory::UInt
                | TypeCategory::Float
                | TypeCategory::Decimal
                | TypeCategory::Date
                | TypeCategory::Date32
                | TypeCategory::DateTime
                | TypeCategory::DateTime64
        )
    }

    /// True for categories Nullable may wrap.
    pub(crate) fn nullable_compatible(&self) -> bool {
        !matches!(
            self.category,
            TypeCategory::Nullable
                | TypeCategory::Array
                | TypeCategory::Tuple
                | TypeCategory::Map
                | TypeCategory::Nested
                | TypeCategory::LowCardinality
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.type_name)
        } else {
            write!(f, "{} {}", self.name, self.type_name)
        }
    }
}
