//! Column definitions.

use bitflags::bitflags;

use crate::data::Value;
use crate::meta::FieldType;

bitflags! {
    /// Column features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ColumnFeatures: u8 {
        /// Not returned by `SELECT *`.
        const HIDDEN = 0b0000_0001;
        /// Generated by the system rather than declared.
        const SYNTHESIZED = 0b0000_0010;
        /// Rejects explicit values on write.
        const READ_ONLY = 0b0000_0100;
    }
}

/// Built-in generators usable as column defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultFunction {
    /// `CURRENT_DATE`.
    CurrentDate,
    /// `LOCALTIME`.
    LocalTime,
    /// `CURRENT_TIMESTAMP`.
    CurrentTimestamp,
    /// `LOCALTIMESTAMP`.
    LocalTimestamp,
}

impl DefaultFunction {
    /// Stable id used by the metadata serializer.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            DefaultFunction::CurrentDate => 1,
            DefaultFunction::LocalTime => 2,
            DefaultFunction::CurrentTimestamp => 3,
            DefaultFunction::LocalTimestamp => 4,
        }
    }

    /// Inverse of [`id`](Self::id).
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(DefaultFunction::CurrentDate),
            2 => Some(DefaultFunction::LocalTime),
            3 => Some(DefaultFunction::CurrentTimestamp),
            4 => Some(DefaultFunction::LocalTimestamp),
            _ => None,
        }
    }
}

/// Value used when a write omits the column.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColumnDefault {
    /// No default: NULL if nullable, a not-null violation otherwise.
    #[default]
    Nothing,
    /// A compiled literal.
    Immediate(Value),
    /// The next value of the named sequence.
    Sequence(String),
    /// A generator function.
    Function(DefaultFunction),
}

/// A table column.
///
/// # Example
///
/// ```rust
/// use jogasaki_sql::catalog::{Column, ColumnDefault};
/// use jogasaki_sql::data::Value;
/// use jogasaki_sql::meta::FieldType;
///
/// let c = Column::new("C0", FieldType::Int4)
///     .not_null()
///     .with_default(ColumnDefault::Immediate(Value::Int4(0)));
/// assert!(!c.nullable());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    field_type: FieldType,
    nullable: bool,
    default: ColumnDefault,
    features: ColumnFeatures,
}

impl Column {
    /// A nullable column without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
            default: ColumnDefault::Nothing,
            features: ColumnFeatures::empty(),
        }
    }

    /// Marks the column `NOT NULL`.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets nullability.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets the default.
    #[must_use]
    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }

    /// Sets features.
    #[must_use]
    pub fn with_features(mut self, features: ColumnFeatures) -> Self {
        self.features = features;
        self
    }

    /// Column name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column type.
    #[inline]
    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Whether NULL is allowed.
    #[inline]
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Default used when a write omits the column.
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> &ColumnDefault {
        &self.default
    }

    /// Column features.
    #[inline]
    #[must_use]
    pub fn features(&self) -> ColumnFeatures {
        self.features
    }

    /// Returns true for hidden columns.
    #[inline]
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.features.contains(ColumnFeatures::HIDDEN)
    }
}
