//! WKT geometry column handling for CSV files

use std::sync::Arc;

use arrow_array::ArrayRef;
use arrow_array::builder::{BinaryBuilder, StringBuilder};
use geoetl_core_common::error::{GeometryError, Result};
use geoetl_core_common::{Geometry, GeometryFormat, GeometryType};

/// Decodes one WKT value and checks it against an optional type hint.
///
/// The hint only validates; it never changes the decoded type.
///
/// # Errors
///
/// Returns the codec error, or `UnexpectedType` when the hint is violated.
pub fn decode_wkt(text: &str, hint: Option<GeometryType>) -> std::result::Result<Geometry, GeometryError> {
    let geometry = Geometry::from_wkt(text)?;
    match hint {
        Some(expected) if expected != geometry.geometry_type() => Err(
            GeometryError::unexpected_type(GeometryFormat::Wkt, expected, geometry.geometry_type()),
        ),
        _ => Ok(geometry),
    }
}

/// Like [`decode_wkt`], returning only the geometry type.
///
/// # Errors
///
/// Same conditions as [`decode_wkt`].
pub fn validate_wkt(text: &str, hint: Option<GeometryType>) -> std::result::Result<GeometryType, GeometryError> {
    decode_wkt(text, hint).map(|geometry| geometry.geometry_type())
}

#[derive(Debug)]
enum Storage {
    Text(StringBuilder),
    Binary(BinaryBuilder),
}

/// Builds the geometry column of a batch from WKT cells.
///
/// Each cell is decoded once. In the default WKT representation the trimmed
/// text is stored as is; other representations store the decoded geometry
/// re-encoded. Blank cells become nulls.
#[derive(Debug)]
pub(crate) struct WktColumnBuilder {
    name: String,
    hint: Option<GeometryType>,
    format: GeometryFormat,
    storage: Storage,
    capacity: usize,
}

impl WktColumnBuilder {
    pub(crate) fn new(name: &str, hint: Option<GeometryType>, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            hint,
            format: GeometryFormat::Wkt,
            storage: Self::storage(GeometryFormat::Wkt, capacity),
            capacity,
        }
    }

    fn storage(format: GeometryFormat, capacity: usize) -> Storage {
        match format {
            GeometryFormat::Wkb => Storage::Binary(BinaryBuilder::with_capacity(capacity, capacity * 21)),
            GeometryFormat::Wkt | GeometryFormat::GeoJson => {
                Storage::Text(StringBuilder::with_capacity(capacity, capacity * 32))
            },
        }
    }

    /// Switches the representation stored for the following rows.
    pub(crate) fn set_format(&mut self, format: GeometryFormat) {
        self.format = format;
        self.storage = Self::storage(format, self.capacity);
    }

    /// Appends the cell of record `row` (1-based).
    pub(crate) fn append(&mut self, value: &str, row: u64) -> Result<()> {
        let text = value.trim();
        if text.is_empty() {
            match &mut self.storage {
                Storage::Text(builder) => builder.append_null(),
                Storage::Binary(builder) => builder.append_null(),
            }
            return Ok(());
        }
        let at = |e: GeometryError| e.at("CSV", &self.name, row);
        let geometry = decode_wkt(text, self.hint).map_err(at)?;
        match (&mut self.storage, self.format) {
            (Storage::Binary(builder), _) => builder.append_value(geometry.to_wkb().map_err(at)?),
            (Storage::Text(builder), GeometryFormat::GeoJson) => {
                builder.append_value(geometry.to_geojson_string().map_err(at)?);
            },
            (Storage::Text(builder), _) => builder.append_value(text),
        }
        Ok(())
    }

    pub(crate) fn finish(&mut self) -> ArrayRef {
        match &mut self.storage {
            Storage::Text(builder) => Arc::new(builder.finish()),
            Storage::Binary(builder) => Arc::new(builder.finish()),
        }
    }
}
