//! Display helpers for schemas.

use arrow_schema::{DataType, Field};
use geoetl_core_common::schema::{geometry_format, is_json_field};

/// Extension trait turning an Arrow [`DataType`] into a short label.
///
/// ```
/// use arrow_schema::DataType;
/// use geoetl_core::utils::ArrowDataTypeExt;
///
/// assert_eq!(DataType::Int64.format(), "Int64");
/// assert_eq!(DataType::Utf8.format(), "String");
/// ```
pub trait ArrowDataTypeExt {
    fn format(&self) -> String;
}

impl ArrowDataTypeExt for DataType {
    fn format(&self) -> String {
        let label = match self {
            DataType::Utf8 | DataType::Utf8View => "String",
            DataType::LargeUtf8 => "LargeString",
            DataType::BinaryView => "Binary",
            DataType::List(_) | DataType::ListView(_) => "List",
            DataType::LargeList(_) => "LargeList",
            DataType::Struct(_) => "Struct",
            DataType::Map(_, _) => "Map",
            DataType::Timestamp(unit, tz) => {
                return match tz {
                    Some(tz) => format!("Timestamp({unit:?}, {tz})"),
                    None => format!("Timestamp({unit:?})"),
                };
            },
            other => return other.to_string(),
        };
        label.to_string()
    }
}

/// Label for a schema field, naming the geometry encoding or nested JSON
/// instead of the storage type.
#[must_use]
pub fn field_type_label(field: &Field) -> String {
    if let Some(format) = geometry_format(field) {
        format!("Geometry ({format})")
    } else if is_json_field(field) {
        "JSON".to_string()
    } else {
        field.data_type().format()
    }
}
