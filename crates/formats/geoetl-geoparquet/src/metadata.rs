//! The `geo` footer metadata of a `GeoParquet` file.

use std::collections::{BTreeMap, BTreeSet};

use geoetl_core_common::error::{Result, schema_incompatible};
use geoetl_core_common::{Geometry, GeometryType};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Key of the file-level key/value entry holding the metadata.
pub const GEO_METADATA_KEY: &str = "geo";
/// Version written by this crate.
pub const GEOPARQUET_VERSION: &str = "1.1.0";
/// The only geometry encoding read and written.
pub const WKB_ENCODING: &str = "WKB";

/// File-level `geo` metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoParquetMetadata {
    pub version: String,
    pub primary_column: String,
    pub columns: BTreeMap<String, GeometryColumnMetadata>,
}

/// Per-column entry of the `geo` metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryColumnMetadata {
    pub encoding: String,
    #[serde(default)]
    pub geometry_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    /// PROJJSON object. A missing key means OGC:CRS84, `Some(Null)` an
    /// explicitly unknown CRS.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub crs: Option<JsonValue>,
}

/// Keeps an explicit `null` as `Some(Value::Null)`.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}

/// Field-level CRS text recording an explicit `"crs": null`.
pub const UNKNOWN_CRS: &str = "null";

impl GeoParquetMetadata {
    /// Parses the JSON text of the `geo` entry.
    ///
    /// # Errors
    ///
    /// Fails with `SchemaIncompatible` on invalid JSON, a primary column that
    /// is not listed, or an encoding other than WKB.
    pub fn parse(text: &str) -> Result<Self> {
        let metadata: Self = serde_json::from_str(text).map_err(|e| {
            schema_incompatible("GeoParquet", format!("invalid 'geo' metadata: {e}"))
        })?;
        if !metadata.columns.contains_key(&metadata.primary_column) {
            return Err(schema_incompatible(
                "GeoParquet",
                format!(
                    "primary column '{}' is missing from the 'geo' metadata",
                    metadata.primary_column
                ),
            ));
        }
        for (name, column) in &metadata.columns {
            if !column.encoding.eq_ignore_ascii_case(WKB_ENCODING) {
                return Err(schema_incompatible(
                    "GeoParquet",
                    format!(
                        "column '{name}' uses the '{}' encoding, only WKB is supported",
                        column.encoding
                    ),
                ));
            }
        }
        Ok(metadata)
    }

    /// Serializes the metadata for the footer.
    ///
    /// # Errors
    ///
    /// Fails if serialization fails (non-finite bbox values are never stored).
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            schema_incompatible("GeoParquet", format!("cannot encode 'geo' metadata: {e}"))
        })
    }
}

impl GeometryColumnMetadata {
    /// Declared geometry types. `" Z"` suffixes are folded into the base type
    /// and unknown names are skipped.
    #[must_use]
    pub fn declared_types(&self) -> BTreeSet<GeometryType> {
        self.geometry_types
            .iter()
            .filter_map(|name| {
                let base = name.trim().trim_end_matches(" Z");
                let parsed = GeometryType::from_name(base);
                if parsed.is_none() {
                    log::debug!("Ignoring unknown GeoParquet geometry type '{name}'");
                }
                parsed
            })
            .collect()
    }

    /// CRS as JSON text: PROJJSON objects are serialized, strings kept as is
    /// and an explicit `null` becomes [`UNKNOWN_CRS`].
    #[must_use]
    pub fn crs_text(&self) -> Option<String> {
        match &self.crs {
            None => None,
            Some(JsonValue::Null) => Some(UNKNOWN_CRS.to_string()),
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Parses a CRS as stored on a geometry field back into a JSON value.
#[must_use]
pub fn crs_value(text: &str) -> JsonValue {
    serde_json::from_str(text).unwrap_or_else(|_| JsonValue::String(text.to_string()))
}

/// Geometry types and extent observed while writing one column.
#[derive(Debug, Clone, Default)]
pub struct ColumnStats {
    types: BTreeSet<(GeometryType, bool)>,
    bbox: Option<[f64; 4]>,
}

impl ColumnStats {
    pub fn observe(&mut self, geometry: &Geometry) {
        self.types.insert((geometry.geometry_type(), geometry.has_z()));
        let [minx, miny, maxx, maxy] = geometry.bbox();
        self.bbox = Some(match self.bbox {
            None => [minx, miny, maxx, maxy],
            Some([a, b, c, d]) => [a.min(minx), b.min(miny), c.max(maxx), d.max(maxy)],
        });
    }

    /// Builds the column entry, with type names such as `"Point Z"`.
    #[must_use]
    pub fn to_metadata(&self, crs: Option<&str>) -> GeometryColumnMetadata {
        GeometryColumnMetadata {
            encoding: WKB_ENCODING.to_string(),
            geometry_types: self
                .types
                .iter()
                .map(|(t, z)| if *z { format!("{t} Z") } else { t.to_string() })
                .collect(),
            bbox: self.bbox.map(Vec::from),
            crs: crs.map(crs_value),
        }
    }
}
