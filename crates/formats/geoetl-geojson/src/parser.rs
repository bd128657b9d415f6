//! `GeoJSON` feature parsing and property type inference.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow_schema::{Field, Schema};
use geoetl_core_common::error::{Result, schema_incompatible};
use geoetl_core_common::schema::{geometry_field, json_field};
use geoetl_core_common::{DatasetSchema, Geometry, GeometryFormat, GeometryType};
use geoetl_format_shared::{InferredType, SourcePosition};
use serde_json::{Map, Value as JsonValue};

/// Name of the geometry column produced by the reader.
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Parsed `GeoJSON` feature with materialized properties and geometry.
#[derive(Debug, Clone)]
pub struct FeatureRecord {
    pub properties: Map<String, JsonValue>,
    /// Normalized geometry object text
    pub geometry: Option<String>,
    pub geometry_type: Option<GeometryType>,
}

/// Parses one feature object. `row` is the 1-based feature number.
///
/// # Errors
///
/// Fails on invalid JSON, a non-Feature object, non-object properties, or a
/// geometry the codec rejects.
pub fn parse_feature(bytes: &[u8], row: u64, position: &SourcePosition) -> Result<FeatureRecord> {
    let value: JsonValue = serde_json::from_slice(bytes)
        .map_err(|e| position.parse_error("GeoJSON", format!("invalid feature JSON: {e}")))?;
    let JsonValue::Object(mut object) = value else {
        return Err(position.parse_error("GeoJSON", "feature must be a JSON object"));
    };
    match object.get("type") {
        Some(JsonValue::String(t)) if t == "Feature" => {},
        Some(other) => {
            return Err(position.parse_error(
                "GeoJSON",
                format!("expected a Feature object, found type {other}"),
            ));
        },
        None => return Err(position.parse_error("GeoJSON", "feature has no 'type' member")),
    }

    let properties = match object.remove("properties") {
        None | Some(JsonValue::Null) => Map::new(),
        Some(JsonValue::Object(properties)) => properties,
        Some(other) => {
            return Err(position.parse_error(
                "GeoJSON",
                format!("'properties' must be an object or null, found {}", describe_value(&other)),
            ));
        },
    };

    // serde_json keeps these as u64; Int64 columns cannot hold them and a
    // Float64 column would round them
    if let Some((key, value)) = properties
        .iter()
        .find(|(_, value)| matches!(value, JsonValue::Number(n) if n.is_u64() && !n.is_i64()))
    {
        return Err(schema_incompatible(
            "GeoJSON",
            format!("property '{key}' in feature {row} is {value}, outside the Int64 range"),
        ));
    }

    let (geometry, geometry_type) = match object.remove("geometry") {
        None | Some(JsonValue::Null) => (None, None),
        Some(value) => {
            let geometry = Geometry::from_geojson_value(value)
                .map_err(|e| e.at("GeoJSON", GEOMETRY_COLUMN, row))?;
            let text = geometry
                .to_geojson_string()
                .map_err(|e| e.at("GeoJSON", GEOMETRY_COLUMN, row))?;
            (Some(text), Some(geometry.geometry_type()))
        },
    };

    Ok(FeatureRecord {
        properties,
        geometry,
        geometry_type,
    })
}

/// Helper to describe JSON value kinds for error messages.
pub(crate) fn describe_value(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Type of a single property value.
#[must_use]
pub fn infer_value(value: &JsonValue) -> InferredType {
    match value {
        JsonValue::Null => InferredType::Null,
        JsonValue::Bool(_) => InferredType::Boolean,
        JsonValue::Number(n) if n.is_i64() => InferredType::Int64,
        JsonValue::Number(_) => InferredType::Float64,
        JsonValue::String(_) => InferredType::Utf8,
        JsonValue::Array(_) | JsonValue::Object(_) => InferredType::Json,
    }
}

/// Property types accumulated over the inference prefix, in first-seen key order.
#[derive(Debug, Default)]
pub struct PropertyInference {
    keys: Vec<(String, InferredType)>,
    index: HashMap<String, usize>,
}

impl PropertyInference {
    /// Merges the property types of one feature.
    ///
    /// # Errors
    ///
    /// Returns `SchemaIncompatible` when a key changes type in a way that
    /// cannot be widened.
    pub fn observe(&mut self, properties: &Map<String, JsonValue>, row: u64) -> Result<()> {
        for (key, value) in properties {
            let observed = infer_value(value);
            match self.index.get(key) {
                Some(&i) => {
                    let current = self.keys[i].1;
                    self.keys[i].1 = current.merge(observed).ok_or_else(|| {
                        schema_incompatible(
                            "GeoJSON",
                            format!(
                                "property '{key}' is {} in earlier features but {} in feature {row}",
                                current.as_str(),
                                observed.as_str()
                            ),
                        )
                    })?;
                },
                None => {
                    self.index.insert(key.clone(), self.keys.len());
                    self.keys.push((key.clone(), observed));
                },
            }
        }
        Ok(())
    }

    /// Property names and types in first-seen order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, InferredType)> {
        self.keys.iter().map(|(k, t)| (k.as_str(), *t))
    }

    /// Builds the dataset schema: properties, then the geometry column.
    ///
    /// # Errors
    ///
    /// Fails if a property is itself named `geometry`.
    pub fn into_schema(self) -> Result<DatasetSchema> {
        let mut fields: Vec<Field> = self
            .keys
            .iter()
            .map(|(name, kind)| match kind {
                InferredType::Json => json_field(name, true),
                other => Field::new(name, other.data_type(), true),
            })
            .collect();
        fields.push(geometry_field(GEOMETRY_COLUMN, GeometryFormat::GeoJson, true));
        DatasetSchema::try_new(Arc::new(Schema::new(fields)))
    }
}

impl fmt::Display for FeatureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let geom = self.geometry_type.map_or("None", |t| t.as_str());
        write!(
            f,
            "FeatureRecord(properties={} keys, geometry={geom})",
            self.properties.len()
        )
    }
}
