//! Data types returned by the ETL operations.
//!
//! This module defines the data structures used to represent dataset information,
//! geometry columns, field schemas, and conversion results.

use geoetl_core_common::{FeatureCount, GeometryType};

/// Information about a dataset.
#[derive(Debug, Clone)]
pub struct DatasetInfo {
    /// Path to the dataset
    pub dataset: String,
    /// Driver name
    pub driver: String,
    /// Driver long name
    pub driver_long_name: String,
    /// Geometry columns information
    pub geometry_columns: Vec<GeometryColumnInfo>,
    /// Schema fields, geometry columns included
    pub fields: Vec<FieldInfo>,
    /// Number of features, when known
    pub feature_count: Option<FeatureCount>,
}

impl DatasetInfo {
    /// Feature count as displayed to users: `"42"` when exact, `">= 42"`
    /// when only a prefix was counted, `"unknown"` otherwise.
    #[must_use]
    pub fn feature_count_label(&self) -> String {
        match self.feature_count {
            Some(FeatureCount { count, exact: true }) => count.to_string(),
            Some(FeatureCount { count, exact: false }) => format!(">= {count}"),
            None => "unknown".to_string(),
        }
    }
}

/// Information about a geometry column.
#[derive(Debug, Clone)]
pub struct GeometryColumnInfo {
    /// Column name
    pub name: String,
    /// Raw encoding of the values (WKT, WKB or GeoJSON)
    pub encoding: String,
    /// Geometry types declared or observed, sorted
    pub geometry_types: Vec<GeometryType>,
    /// CRS information
    pub crs: Option<String>,
}

impl GeometryColumnInfo {
    /// `"Point"`, `"Point, Polygon"` for mixed columns, or `"Unknown"` when
    /// nothing was observed.
    #[must_use]
    pub fn geometry_type_label(&self) -> String {
        if self.geometry_types.is_empty() {
            return "Unknown".to_string();
        }
        self.geometry_types
            .iter()
            .map(GeometryType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Information about a field/column.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Data type
    pub data_type: String,
    /// Whether the field is nullable
    pub nullable: bool,
}

/// Outcome of a completed conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Batches written
    pub batches: usize,
    /// Rows written
    pub rows: usize,
}
