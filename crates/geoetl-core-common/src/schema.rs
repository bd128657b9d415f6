//! Schema model: Arrow schemas with designated geometry columns.
//!
//! Geometry columns are ordinary Arrow fields tagged with the
//! `ARROW:extension:name` metadata key naming their raw representation. The
//! primary geometry column is the first geometry column unless the schema
//! metadata names another one under [`PRIMARY_GEOMETRY_KEY`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};

use crate::error::{Result, schema_incompatible};
use crate::geometry::GeometryFormat;

/// Arrow field metadata key holding the extension type name.
pub const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";
/// Extension name of WKT geometry columns (Utf8).
pub const WKT_EXTENSION: &str = "geoarrow.wkt";
/// Extension name of WKB geometry columns (Binary).
pub const WKB_EXTENSION: &str = "geoarrow.wkb";
/// Extension name of `GeoJSON` geometry object columns (Utf8).
pub const GEOJSON_EXTENSION: &str = "geoetl.geojson";
/// Extension name of nested JSON property columns (Utf8).
pub const JSON_EXTENSION: &str = "geoetl.json";
/// Schema metadata key naming the primary geometry column.
pub const PRIMARY_GEOMETRY_KEY: &str = "geoetl:primary_geometry";
/// Field metadata key carrying a geometry column's CRS as JSON text.
pub const CRS_KEY: &str = "geoetl:crs";

impl GeometryFormat {
    /// Extension name used to tag fields holding this representation.
    #[must_use]
    pub fn extension_name(&self) -> &'static str {
        match self {
            Self::Wkt => WKT_EXTENSION,
            Self::Wkb => WKB_EXTENSION,
            Self::GeoJson => GEOJSON_EXTENSION,
        }
    }

    /// Arrow storage type for this representation.
    #[must_use]
    pub fn storage_type(&self) -> DataType {
        match self {
            Self::Wkb => DataType::Binary,
            Self::Wkt | Self::GeoJson => DataType::Utf8,
        }
    }

    /// Looks up a representation by extension name.
    #[must_use]
    pub fn from_extension_name(name: &str) -> Option<Self> {
        match name {
            WKT_EXTENSION => Some(Self::Wkt),
            WKB_EXTENSION => Some(Self::Wkb),
            GEOJSON_EXTENSION => Some(Self::GeoJson),
            _ => None,
        }
    }
}

/// Creates a geometry field holding values in `format`.
#[must_use]
pub fn geometry_field(name: &str, format: GeometryFormat, nullable: bool) -> Field {
    Field::new(name, format.storage_type(), nullable).with_metadata(HashMap::from([(
        EXTENSION_NAME_KEY.to_string(),
        format.extension_name().to_string(),
    )]))
}

/// Returns the geometry representation of a field, if it is a geometry field.
#[must_use]
pub fn geometry_format(field: &Field) -> Option<GeometryFormat> {
    field
        .metadata()
        .get(EXTENSION_NAME_KEY)
        .and_then(|name| GeometryFormat::from_extension_name(name))
}

/// Creates a Utf8 field holding nested JSON values.
#[must_use]
pub fn json_field(name: &str, nullable: bool) -> Field {
    Field::new(name, DataType::Utf8, nullable).with_metadata(HashMap::from([(
        EXTENSION_NAME_KEY.to_string(),
        JSON_EXTENSION.to_string(),
    )]))
}

/// Returns `true` if the field holds nested JSON text.
#[must_use]
pub fn is_json_field(field: &Field) -> bool {
    field
        .metadata()
        .get(EXTENSION_NAME_KEY)
        .is_some_and(|name| name == JSON_EXTENSION)
}

/// A geometry column resolved from a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryColumn {
    /// Position of the field in the schema
    pub index: usize,
    /// Field name
    pub name: String,
    /// Raw representation of the values
    pub format: GeometryFormat,
    /// CRS as JSON text, when known
    pub crs: Option<String>,
}

/// An Arrow schema validated for use in a conversion.
#[derive(Debug, Clone)]
pub struct DatasetSchema {
    schema: SchemaRef,
    geometry_columns: Vec<GeometryColumn>,
    primary: Option<usize>,
}

impl DatasetSchema {
    /// Validates an Arrow schema and resolves its geometry columns.
    ///
    /// # Errors
    ///
    /// Fails with `SchemaIncompatible` if field names are not unique or the
    /// primary geometry metadata names a non-geometry column.
    pub fn try_new(schema: SchemaRef) -> Result<Self> {
        let mut seen = HashSet::new();
        for field in schema.fields() {
            if !seen.insert(field.name().as_str()) {
                return Err(schema_incompatible(
                    "dataset",
                    format!("duplicate field name '{}'", field.name()),
                ));
            }
        }

        let geometry_columns: Vec<GeometryColumn> = schema
            .fields()
            .iter()
            .enumerate()
            .filter_map(|(index, field)| {
                geometry_format(field).map(|format| GeometryColumn {
                    index,
                    name: field.name().clone(),
                    format,
                    crs: field.metadata().get(CRS_KEY).cloned(),
                })
            })
            .collect();

        let primary = match schema.metadata().get(PRIMARY_GEOMETRY_KEY) {
            Some(name) => Some(
                geometry_columns
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| {
                        schema_incompatible(
                            "dataset",
                            format!("primary geometry column '{name}' is not a geometry column"),
                        )
                    })?,
            ),
            None if geometry_columns.is_empty() => None,
            None => Some(0),
        };

        Ok(Self {
            schema,
            geometry_columns,
            primary,
        })
    }

    /// The underlying Arrow schema.
    #[must_use]
    pub fn arrow_schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Geometry columns in field order.
    #[must_use]
    pub fn geometry_columns(&self) -> &[GeometryColumn] {
        &self.geometry_columns
    }

    /// The primary geometry column, if the schema has any geometry.
    #[must_use]
    pub fn primary_geometry(&self) -> Option<&GeometryColumn> {
        self.primary.map(|i| &self.geometry_columns[i])
    }

    /// Returns the geometry column stored at field `index`, if any.
    #[must_use]
    pub fn geometry_at(&self, index: usize) -> Option<&GeometryColumn> {
        self.geometry_columns.iter().find(|c| c.index == index)
    }

    /// Fails deterministically when a writer supports fewer geometry columns
    /// than the schema has.
    ///
    /// # Errors
    ///
    /// Returns `SchemaIncompatible` naming the geometry columns found.
    pub fn check_geometry_limit(&self, driver: &str, max: Option<usize>) -> Result<()> {
        match max {
            Some(max) if self.geometry_columns.len() > max => Err(schema_incompatible(
                driver,
                format!(
                    "{driver} supports at most {max} geometry column(s), found {}: {}",
                    self.geometry_columns.len(),
                    self.geometry_columns
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Returns the schema with every geometry column retagged to `format`.
    ///
    /// Field order, names, nullability and other metadata are kept.
    #[must_use]
    pub fn with_geometry_format(&self, format: GeometryFormat) -> Self {
        let fields: Vec<Field> = self
            .schema
            .fields()
            .iter()
            .enumerate()
            .map(|(index, field)| {
                if self.geometry_at(index).is_some() {
                    let mut metadata = field.metadata().clone();
                    metadata.insert(
                        EXTENSION_NAME_KEY.to_string(),
                        format.extension_name().to_string(),
                    );
                    Field::new(field.name(), format.storage_type(), field.is_nullable())
                        .with_metadata(metadata)
                } else {
                    field.as_ref().clone()
                }
            })
            .collect();
        let schema = Arc::new(Schema::new_with_metadata(
            fields,
            self.schema.metadata().clone(),
        ));
        let geometry_columns = self
            .geometry_columns
            .iter()
            .map(|c| GeometryColumn {
                format,
                ..c.clone()
            })
            .collect();
        Self {
            schema,
            geometry_columns,
            primary: self.primary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn schema(fields: Vec<Field>) -> SchemaRef {
        Arc::new(Schema::new(fields))
    }

    #[test]
    fn test_geometry_columns_resolved() {
        let dataset = DatasetSchema::try_new(schema(vec![
            Field::new("name", DataType::Utf8, true),
            geometry_field("geom", GeometryFormat::Wkt, true),
            geometry_field("centroid", GeometryFormat::Wkb, true),
        ]))
        .unwrap();

        assert_eq!(dataset.geometry_columns().len(), 2);
        let primary = dataset.primary_geometry().unwrap();
        assert_eq!(primary.name, "geom");
        assert_eq!(primary.index, 1);
        assert!(dataset.geometry_at(0).is_none());
    }

    #[test]
    fn test_primary_from_metadata() {
        let fields = vec![
            geometry_field("a", GeometryFormat::Wkb, true),
            geometry_field("b", GeometryFormat::Wkb, true),
        ];
        let metadata = HashMap::from([(PRIMARY_GEOMETRY_KEY.to_string(), "b".to_string())]);
        let dataset =
            DatasetSchema::try_new(Arc::new(Schema::new_with_metadata(fields, metadata))).unwrap();
        assert_eq!(dataset.primary_geometry().unwrap().name, "b");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = DatasetSchema::try_new(schema(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("id", DataType::Utf8, true),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaIncompatible);
    }

    #[test]
    fn test_geometry_limit() {
        let dataset = DatasetSchema::try_new(schema(vec![
            geometry_field("a", GeometryFormat::Wkt, true),
            geometry_field("b", GeometryFormat::Wkt, true),
        ]))
        .unwrap();
        assert!(dataset.check_geometry_limit("GeoParquet", None).is_ok());
        let err = dataset.check_geometry_limit("CSV", Some(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaIncompatible);
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_with_geometry_format_keeps_crs() {
        let field = geometry_field("geom", GeometryFormat::Wkt, false);
        let mut metadata = field.metadata().clone();
        metadata.insert(CRS_KEY.to_string(), "\"EPSG:3857\"".to_string());
        let field = field.with_metadata(metadata);
        let dataset = DatasetSchema::try_new(schema(vec![
            Field::new("id", DataType::Int64, false),
            field,
        ]))
        .unwrap();

        let retagged = dataset.with_geometry_format(GeometryFormat::Wkb);
        let geom = retagged.arrow_schema().field(1);
        assert_eq!(geom.data_type(), &DataType::Binary);
        assert!(!geom.is_nullable());
        assert_eq!(geometry_format(geom), Some(GeometryFormat::Wkb));
        assert_eq!(
            retagged.primary_geometry().unwrap().crs.as_deref(),
            Some("\"EPSG:3857\"")
        );
    }
}
