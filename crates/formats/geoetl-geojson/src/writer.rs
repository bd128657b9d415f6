//! `GeoJSON` writer streaming a `FeatureCollection` one feature per line.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, UInt8Type, UInt16Type,
    UInt32Type, UInt64Type,
};
use arrow_array::{Array, RecordBatch};
use arrow_cast::display::{ArrayFormatter, FormatOptions};
use arrow_schema::DataType;
use geoetl_core_common::error::{IoErrorExt, Result, schema_incompatible};
use geoetl_core_common::geometry::decode_value;
use geoetl_core_common::io::create_sink;
use geoetl_core_common::schema::is_json_field;
use geoetl_core_common::{BatchWriter, DatasetSchema, GeometryFormat, WriteSummary};
use geojson::Feature;
use serde_json::{Map, Number, Value as JsonValue};

const HEADER: &[u8] = b"{\"type\":\"FeatureCollection\",\"features\":[\n";
const FOOTER: &[u8] = b"\n]}\n";

fn float_value(value: f64) -> JsonValue {
    Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
}

/// Converts one property cell to JSON. Non-finite floats become `null`.
fn property_value(
    array: &dyn Array,
    row: usize,
    nested: bool,
    formatter: Option<&ArrayFormatter<'_>>,
    column: &str,
) -> Result<JsonValue> {
    if array.is_null(row) {
        return Ok(JsonValue::Null);
    }
    Ok(match array.data_type() {
        DataType::Boolean => JsonValue::Bool(array.as_boolean().value(row)),
        DataType::Int8 => array.as_primitive::<Int8Type>().value(row).into(),
        DataType::Int16 => array.as_primitive::<Int16Type>().value(row).into(),
        DataType::Int32 => array.as_primitive::<Int32Type>().value(row).into(),
        DataType::Int64 => array.as_primitive::<Int64Type>().value(row).into(),
        DataType::UInt8 => array.as_primitive::<UInt8Type>().value(row).into(),
        DataType::UInt16 => array.as_primitive::<UInt16Type>().value(row).into(),
        DataType::UInt32 => array.as_primitive::<UInt32Type>().value(row).into(),
        DataType::UInt64 => array.as_primitive::<UInt64Type>().value(row).into(),
        DataType::Float32 => float_value(f64::from(array.as_primitive::<Float32Type>().value(row))),
        DataType::Float64 => float_value(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let text = match array.data_type() {
                DataType::Utf8 => array.as_string::<i32>().value(row),
                DataType::LargeUtf8 => array.as_string::<i64>().value(row),
                _ => array.as_string_view().value(row),
            };
            if nested {
                serde_json::from_str(text).map_err(|e| {
                    schema_incompatible(
                        "GeoJSON",
                        format!("column '{column}' row {row} holds invalid JSON: {e}"),
                    )
                })?
            } else {
                JsonValue::String(text.to_string())
            }
        },
        other => {
            let formatter = formatter.ok_or_else(|| {
                schema_incompatible("GeoJSON", format!("cannot write {other} column '{column}'"))
            })?;
            let text = formatter
                .value(row)
                .try_to_string()
                .map_err(|e| schema_incompatible("GeoJSON", e.to_string()))?;
            JsonValue::String(text)
        },
    })
}

fn needs_formatter(data_type: &DataType) -> bool {
    !matches!(
        data_type,
        DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Utf8
            | DataType::LargeUtf8
            | DataType::Utf8View
    )
}

/// Writes a `FeatureCollection`: header, one feature per line, footer.
///
/// The file is written in place; a failure leaves a truncated document.
pub struct GeoJsonWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    schema: DatasetSchema,
    summary: WriteSummary,
}

impl GeoJsonWriter {
    /// Creates the output file and writes the collection header.
    ///
    /// # Errors
    ///
    /// Fails with `SchemaIncompatible` if the schema has more than one geometry
    /// column or its geometry is not `GeoJSON`, or if the file cannot be created.
    pub fn try_new(path: &Path, schema: &DatasetSchema) -> Result<Self> {
        schema.check_geometry_limit("GeoJSON", Some(1))?;
        if let Some(column) = schema.primary_geometry() {
            if column.format != GeometryFormat::GeoJson {
                return Err(schema_incompatible(
                    "GeoJSON",
                    format!(
                        "geometry column '{}' must hold GeoJSON geometry objects, found {}",
                        column.name, column.format
                    ),
                ));
            }
        }
        let mut writer = BufWriter::new(create_sink(path, "GeoJSON")?);
        writer.write_all(HEADER).with_write_context("GeoJSON", path)?;
        log::debug!("Created GeoJSON writer for {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            schema: schema.clone(),
            summary: WriteSummary::default(),
        })
    }

    fn feature(&self, batch: &RecordBatch, row: usize, formatters: &[Option<ArrayFormatter<'_>>]) -> Result<Feature> {
        let geometry_column = self.schema.primary_geometry();
        let row_number = (self.summary.rows + row + 1) as u64;
        let mut properties = Map::new();
        let mut geometry = None;
        for (index, field) in batch.schema().fields().iter().enumerate() {
            let array = batch.column(index);
            if let Some(column) = geometry_column.filter(|c| c.index == index) {
                geometry = decode_value(array.as_ref(), row, GeometryFormat::GeoJson)
                    .and_then(|g| g.map(|g| g.to_geojson()).transpose())
                    .map_err(|e| e.at("GeoJSON", &column.name, row_number))?;
                continue;
            }
            let value = property_value(
                array.as_ref(),
                row,
                is_json_field(field),
                formatters[index].as_ref(),
                field.name(),
            )?;
            properties.insert(field.name().clone(), value);
        }
        Ok(Feature {
            bbox: None,
            geometry,
            id: None,
            properties: Some(properties),
            foreign_members: None,
        })
    }
}

impl BatchWriter for GeoJsonWriter {
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let formatters = batch
            .columns()
            .iter()
            .map(|array| {
                if needs_formatter(array.data_type()) {
                    ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())
                        .map(Some)
                        .map_err(|e| schema_incompatible("GeoJSON", e.to_string()))
                } else {
                    Ok(None)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            let feature = self.feature(batch, row, &formatters)?;
            if self.summary.rows + row > 0 {
                self.writer
                    .write_all(b",\n")
                    .with_write_context("GeoJSON", &self.path)?;
            }
            serde_json::to_writer(&mut self.writer, &feature)
                .with_write_context("GeoJSON", &self.path)?;
        }
        self.summary.record(batch);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<WriteSummary> {
        self.writer
            .write_all(FOOTER)
            .with_write_context("GeoJSON", &self.path)?;
        self.writer.flush().with_write_context("GeoJSON", &self.path)?;
        log::debug!(
            "Wrote {} GeoJSON feature(s) to {}",
            self.summary.rows,
            self.path.display()
        );
        Ok(self.summary)
    }
}
