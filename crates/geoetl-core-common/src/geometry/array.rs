//! Arrow array helpers for geometry columns.

use std::sync::Arc;

use arrow_array::builder::{BinaryBuilder, StringBuilder};
use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef};
use arrow_schema::DataType;

use super::{Geometry, GeometryFormat, decode};
use crate::error::{GeometryError, GeometryErrorKind};

/// A codec failure at a given array index.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError {
    /// Index of the offending value within the array
    pub index: usize,
    /// The codec error
    pub error: GeometryError,
}

fn raw_value(array: &dyn Array, index: usize) -> Option<&[u8]> {
    if array.is_null(index) {
        return None;
    }
    match array.data_type() {
        DataType::Utf8 => Some(array.as_string::<i32>().value(index).as_bytes()),
        DataType::LargeUtf8 => Some(array.as_string::<i64>().value(index).as_bytes()),
        DataType::Utf8View => Some(array.as_string_view().value(index).as_bytes()),
        DataType::Binary => Some(array.as_binary::<i32>().value(index)),
        DataType::LargeBinary => Some(array.as_binary::<i64>().value(index)),
        DataType::BinaryView => Some(array.as_binary_view().value(index)),
        _ => None,
    }
}

fn check_storage(array: &dyn Array, format: GeometryFormat) -> Result<(), GeometryError> {
    let ok = match format {
        GeometryFormat::Wkb => matches!(
            array.data_type(),
            DataType::Binary | DataType::LargeBinary | DataType::BinaryView
        ),
        GeometryFormat::Wkt | GeometryFormat::GeoJson => matches!(
            array.data_type(),
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
        ),
    };
    if ok {
        Ok(())
    } else {
        Err(GeometryError::decode(
            format,
            GeometryErrorKind::InvalidStructure,
            format!("{format} values cannot be stored as {}", array.data_type()),
        ))
    }
}

/// Decodes the value at `index`, returning `None` for nulls.
///
/// # Errors
///
/// Returns the codec error if the value cannot be decoded or the array's
/// storage type does not match `format`.
pub fn decode_value(
    array: &dyn Array,
    index: usize,
    format: GeometryFormat,
) -> Result<Option<Geometry>, GeometryError> {
    check_storage(array, format)?;
    raw_value(array, index)
        .map(|raw| decode(raw, format))
        .transpose()
}

/// Re-encodes every value of a geometry array from one representation to
/// another, keeping nulls and order. Arrays already in the target
/// representation are returned unchanged.
///
/// # Errors
///
/// Returns the index and codec error of the first value that fails.
pub fn transcode_array(
    array: &ArrayRef,
    from: GeometryFormat,
    to: GeometryFormat,
) -> Result<ArrayRef, ValueError> {
    if from == to {
        return Ok(Arc::clone(array));
    }
    check_storage(array.as_ref(), from).map_err(|error| ValueError { index: 0, error })?;

    let len = array.len();
    let decoded = (0..len).map(|index| {
        raw_value(array.as_ref(), index)
            .map(|raw| decode(raw, from))
            .transpose()
            .map_err(|error| ValueError { index, error })
    });

    match to {
        GeometryFormat::Wkb => {
            let mut builder = BinaryBuilder::with_capacity(len, len * 21);
            for (index, geometry) in decoded.enumerate() {
                match geometry? {
                    Some(geometry) => {
                        let wkb = geometry
                            .to_wkb()
                            .map_err(|error| ValueError { index, error })?;
                        builder.append_value(wkb);
                    },
                    None => builder.append_null(),
                }
            }
            Ok(Arc::new(builder.finish()))
        },
        GeometryFormat::Wkt | GeometryFormat::GeoJson => {
            let mut builder = StringBuilder::with_capacity(len, len * 32);
            for (index, geometry) in decoded.enumerate() {
                match geometry? {
                    Some(geometry) => {
                        let text = if to == GeometryFormat::Wkt {
                            geometry.to_wkt()
                        } else {
                            geometry.to_geojson_string()
                        }
                        .map_err(|error| ValueError { index, error })?;
                        builder.append_value(text);
                    },
                    None => builder.append_null(),
                }
            }
            Ok(Arc::new(builder.finish()))
        },
    }
}
