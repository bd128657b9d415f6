//! Scalar type inference.

use arrow_schema::DataType;

/// Type inferred for a scalar column from sample values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredType {
    /// Only nulls seen so far
    Null,
    Boolean,
    Int64,
    Float64,
    Utf8,
    /// Nested JSON (arrays or objects)
    Json,
}

impl InferredType {
    /// Infers the type of a single text cell. Empty cells are [`InferredType::Null`].
    #[must_use]
    pub fn of_text(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() {
            Self::Null
        } else if parse_bool(value).is_some() {
            Self::Boolean
        } else if value.parse::<i64>().is_ok() {
            Self::Int64
        } else if parse_f64(value).is_some() {
            Self::Float64
        } else {
            Self::Utf8
        }
    }

    /// Strict merge: nulls adopt the other type and integers widen to floats.
    /// Returns `None` for any other disagreement.
    #[must_use]
    pub fn merge(self, other: Self) -> Option<Self> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Self::Null, t) | (t, Self::Null) => Some(t),
            (Self::Int64, Self::Float64) | (Self::Float64, Self::Int64) => Some(Self::Float64),
            _ => None,
        }
    }

    /// Lenient merge for text sources: any disagreement falls back to Utf8.
    #[must_use]
    pub fn widen(self, other: Self) -> Self {
        self.merge(other).unwrap_or(Self::Utf8)
    }

    /// Arrow type of the column; all-null columns become Utf8.
    #[must_use]
    pub fn data_type(self) -> DataType {
        match self {
            Self::Boolean => DataType::Boolean,
            Self::Int64 => DataType::Int64,
            Self::Float64 => DataType::Float64,
            Self::Null | Self::Utf8 | Self::Json => DataType::Utf8,
        }
    }

    /// Short label for error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Int64 => "integer",
            Self::Float64 => "float",
            Self::Utf8 => "string",
            Self::Json => "JSON array/object",
        }
    }
}

/// Parses `true`/`false` ignoring ASCII case.
#[must_use]
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parses a finite float; `NaN` and `inf` spellings are not numbers here.
#[must_use]
pub(crate) fn parse_f64(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(values: &[&str]) -> InferredType {
        values
            .iter()
            .map(|v| InferredType::of_text(v))
            .fold(InferredType::Null, InferredType::widen)
    }

    #[test]
    fn test_text_inference() {
        assert_eq!(infer(&["1", "2", ""]), InferredType::Int64);
        assert_eq!(infer(&["1", "2.5"]), InferredType::Float64);
        assert_eq!(infer(&["true", "FALSE"]), InferredType::Boolean);
        assert_eq!(infer(&["1", "abc"]), InferredType::Utf8);
        assert_eq!(infer(&["true", "1"]), InferredType::Utf8);
        assert_eq!(infer(&["NaN"]), InferredType::Utf8);
        assert_eq!(infer(&["", " "]), InferredType::Null);
        assert_eq!(infer(&["", " "]).data_type(), DataType::Utf8);
    }

    #[test]
    fn test_strict_merge() {
        assert_eq!(
            InferredType::Int64.merge(InferredType::Float64),
            Some(InferredType::Float64)
        );
        assert_eq!(
            InferredType::Null.merge(InferredType::Json),
            Some(InferredType::Json)
        );
        assert_eq!(InferredType::Boolean.merge(InferredType::Int64), None);
        assert_eq!(InferredType::Utf8.merge(InferredType::Float64), None);
    }
}
