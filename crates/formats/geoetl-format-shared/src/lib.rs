//! Helpers shared by the row-oriented format drivers.
//!
//! - [`SourcePosition`] locates a failure inside a source file.
//! - [`InferredType`] implements scalar type inference and widening.
//! - [`ColumnBuilder`] appends typed scalar values into Arrow arrays.

mod builder;
mod inference;

use std::fmt;

pub use builder::{ColumnBuilder, ValueMismatch};
pub use inference::InferredType;

use geoetl_core_common::GeoEtlError;
use geoetl_core_common::error::FormatError;

/// A position within a source file, such as a CSV record.
///
/// All indices are 1-based where possible to align with human expectations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePosition {
    /// Line number in the source (1-based)
    pub line: Option<u64>,
    /// Column (field) number in the source (1-based)
    pub column: Option<u64>,
    /// Byte offset from the start of the source
    pub byte_offset: Option<u64>,
    /// Logical record number (1-based, header excluded)
    pub record: Option<u64>,
}

impl SourcePosition {
    /// Position of a record at a given line.
    #[must_use]
    pub fn record(record: u64, line: Option<u64>) -> Self {
        Self {
            line,
            record: Some(record),
            ..Self::default()
        }
    }

    /// Position at a byte offset.
    #[must_use]
    pub fn byte(offset: u64) -> Self {
        Self {
            byte_offset: Some(offset),
            ..Self::default()
        }
    }

    /// Returns true when the position does not contain any location metadata.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line.is_none()
            && self.column.is_none()
            && self.byte_offset.is_none()
            && self.record.is_none()
    }

    /// Builds a parse error located at this position.
    #[must_use]
    pub fn parse_error(&self, format: &str, message: impl Into<String>) -> GeoEtlError {
        FormatError::Parse {
            format: format.to_string(),
            position: (!self.is_empty()).then(|| self.to_string()),
            message: message.into(),
        }
        .into()
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(line) = self.line {
            parts.push(format!("line {line}"));
        }
        if let Some(column) = self.column {
            parts.push(format!("column {column}"));
        }
        if let Some(record) = self.record {
            parts.push(format!("record {record}"));
        }
        if let Some(byte) = self.byte_offset {
            parts.push(format!("byte {byte}"));
        }

        if parts.is_empty() {
            write!(f, "unknown position")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_source_position() {
        let pos = SourcePosition {
            line: Some(10),
            column: Some(3),
            ..SourcePosition::default()
        };

        assert_eq!(pos.to_string(), "line 10, column 3");
        assert_eq!(SourcePosition::default().to_string(), "unknown position");
    }

    #[test]
    fn parse_error_carries_position() {
        let error = SourcePosition::record(4, Some(5)).parse_error("CSV", "unexpected delimiter");
        assert_eq!(
            error.to_string(),
            "Failed to parse CSV at line 5, record 4: unexpected delimiter"
        );

        let error = SourcePosition::default().parse_error("GeoJSON", "truncated");
        assert_eq!(
            error.to_string(),
            "Failed to parse GeoJSON at unknown position: truncated"
        );
    }
}
