//! Typed Arrow column builders.

use std::fmt;
use std::sync::Arc;

use arrow_array::ArrayRef;
use arrow_array::builder::{BooleanBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow_schema::DataType;

use crate::inference::{parse_bool, parse_f64};

/// A value that does not fit the column's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMismatch {
    /// The column type
    pub expected: DataType,
}

impl fmt::Display for ValueMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value does not fit column type {}", self.expected)
    }
}

/// Builder for one scalar column.
#[derive(Debug)]
pub enum ColumnBuilder {
    Boolean(BooleanBuilder),
    Int64(Int64Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
}

impl ColumnBuilder {
    /// Creates a builder for `data_type`; `None` for types without a builder.
    #[must_use]
    pub fn new(data_type: &DataType, capacity: usize) -> Option<Self> {
        Some(match data_type {
            DataType::Boolean => Self::Boolean(BooleanBuilder::with_capacity(capacity)),
            DataType::Int64 => Self::Int64(Int64Builder::with_capacity(capacity)),
            DataType::Float64 => Self::Float64(Float64Builder::with_capacity(capacity)),
            DataType::Utf8 => Self::Utf8(StringBuilder::with_capacity(capacity, capacity * 16)),
            _ => return None,
        })
    }

    fn mismatch(&self) -> ValueMismatch {
        ValueMismatch {
            expected: self.data_type(),
        }
    }

    /// Arrow type produced by this builder.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Utf8(_) => DataType::Utf8,
        }
    }

    pub fn append_null(&mut self) {
        match self {
            Self::Boolean(b) => b.append_null(),
            Self::Int64(b) => b.append_null(),
            Self::Float64(b) => b.append_null(),
            Self::Utf8(b) => b.append_null(),
        }
    }

    /// Parses a text cell into the column type. Empty (or blank) cells are null
    /// for non-string columns; string columns keep the text as is.
    ///
    /// # Errors
    ///
    /// Returns [`ValueMismatch`] when the text does not parse as the column type.
    pub fn append_text(&mut self, value: &str) -> Result<(), ValueMismatch> {
        if let Self::Utf8(b) = self {
            if value.is_empty() {
                b.append_null();
            } else {
                b.append_value(value);
            }
            return Ok(());
        }
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.append_null();
            return Ok(());
        }
        let mismatch = self.mismatch();
        match self {
            Self::Boolean(b) => b.append_value(parse_bool(trimmed).ok_or(mismatch)?),
            Self::Int64(b) => b.append_value(trimmed.parse().map_err(|_| mismatch)?),
            Self::Float64(b) => b.append_value(parse_f64(trimmed).ok_or(mismatch)?),
            Self::Utf8(_) => {},
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Fails unless this is a boolean column.
    pub fn append_bool(&mut self, value: bool) -> Result<(), ValueMismatch> {
        match self {
            Self::Boolean(b) => b.append_value(value),
            _ => return Err(self.mismatch()),
        }
        Ok(())
    }

    /// Appends an integer; float columns accept it widened.
    ///
    /// # Errors
    ///
    /// Fails for boolean and string columns.
    #[allow(clippy::cast_precision_loss)]
    pub fn append_i64(&mut self, value: i64) -> Result<(), ValueMismatch> {
        match self {
            Self::Int64(b) => b.append_value(value),
            Self::Float64(b) => b.append_value(value as f64),
            _ => return Err(self.mismatch()),
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Fails unless this is a float column.
    pub fn append_f64(&mut self, value: f64) -> Result<(), ValueMismatch> {
        match self {
            Self::Float64(b) => b.append_value(value),
            _ => return Err(self.mismatch()),
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Fails unless this is a string column.
    pub fn append_str(&mut self, value: &str) -> Result<(), ValueMismatch> {
        match self {
            Self::Utf8(b) => b.append_value(value),
            _ => return Err(self.mismatch()),
        }
        Ok(())
    }

    /// Finishes the current array and resets the builder.
    pub fn finish(&mut self) -> ArrayRef {
        match self {
            Self::Boolean(b) => Arc::new(b.finish()),
            Self::Int64(b) => Arc::new(b.finish()),
            Self::Float64(b) => Arc::new(b.finish()),
            Self::Utf8(b) => Arc::new(b.finish()),
        }
    }
}
