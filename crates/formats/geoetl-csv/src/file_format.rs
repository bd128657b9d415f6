//! CSV format configuration and schema inference

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow_schema::{Field, Schema};
use csv::StringRecord;
use geoetl_core_common::error::{Result, schema_incompatible};
use geoetl_core_common::geometry::GeometryType;
use geoetl_core_common::io::open_source;
use geoetl_core_common::options::DEFAULT_BATCH_SIZE;
use geoetl_core_common::schema::geometry_field;
use geoetl_core_common::{DatasetSchema, GeometryFormat};
use geoetl_format_shared::InferredType;

use crate::geospatial::validate_wkt;
use crate::reader::csv_error;

/// CSV format configuration options
#[derive(Debug, Clone)]
pub struct CsvFormatOptions {
    /// Whether the CSV file has a header row (default: true)
    pub has_header: bool,
    /// The delimiter character (default: b',')
    pub delimiter: u8,
    /// Maximum number of records read for schema inference, `None` for the whole file
    pub schema_infer_max_rec: Option<usize>,
    /// Batch size for reading (default: 8192)
    pub batch_size: usize,
}

impl Default for CsvFormatOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: b',',
            schema_infer_max_rec: Some(1000),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl CsvFormatOptions {
    /// Create new CSV format options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the CSV has a header row
    #[must_use]
    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set the delimiter character
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set maximum records for schema inference
    #[must_use]
    pub fn with_schema_infer_max_rec(mut self, max_rec: Option<usize>) -> Self {
        self.schema_infer_max_rec = max_rec;
        self
    }

    /// Set batch size for reading
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub(crate) fn reader(&self, file: File) -> csv::Reader<File> {
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_header)
            .from_reader(file)
    }
}

/// Outcome of inferring a schema from the leading records of a file.
#[derive(Debug, Clone)]
pub struct CsvSchemaInference {
    /// Inferred schema, geometry column tagged as WKT
    pub schema: DatasetSchema,
    /// Geometry column position
    pub geometry_index: usize,
    /// Records examined
    pub records: u64,
    /// `true` if the examined prefix was the whole file
    pub reached_eof: bool,
    /// Geometry types seen in the prefix
    pub geometry_types: BTreeSet<GeometryType>,
}

fn column_names(reader: &mut csv::Reader<File>, has_header: bool, path: &Path) -> Result<Vec<String>> {
    let headers = reader.headers().map_err(|e| csv_error(e, path))?;
    Ok(if has_header {
        headers.iter().map(str::to_string).collect()
    } else {
        (1..=headers.len()).map(|i| format!("column_{i}")).collect()
    })
}

/// Infers field types from up to `schema_infer_max_rec` records.
///
/// The result is a best-effort summary of the prefix: a later value that does
/// not fit the inferred type fails the read with `SchemaIncompatible`.
///
/// # Errors
///
/// Fails if the file cannot be read, a record is malformed, the geometry column
/// is missing from the header, or a WKT value in the prefix does not decode.
pub fn infer_schema(
    path: &Path,
    options: &CsvFormatOptions,
    geometry_column: &str,
    hint: Option<GeometryType>,
) -> Result<CsvSchemaInference> {
    let mut reader = options.reader(open_source(path, "CSV")?);
    let names = column_names(&mut reader, options.has_header, path)?;
    let geometry_index = names
        .iter()
        .position(|name| name == geometry_column)
        .ok_or_else(|| {
            schema_incompatible(
                "CSV",
                format!(
                    "geometry column '{geometry_column}' not found; available columns: {}",
                    names.join(", ")
                ),
            )
        })?;

    let limit = options.schema_infer_max_rec.unwrap_or(usize::MAX);
    let mut types = vec![InferredType::Null; names.len()];
    let mut geometry_types = BTreeSet::new();
    let mut record = StringRecord::new();
    let mut records: u64 = 0;
    let mut seen = 0;

    let reached_eof = loop {
        let more = reader
            .read_record(&mut record)
            .map_err(|e| csv_error(e, path))?;
        if !more {
            break true;
        }
        if seen == limit {
            break false;
        }
        seen += 1;
        records += 1;
        for (index, value) in record.iter().enumerate() {
            if index == geometry_index {
                let text = value.trim();
                if !text.is_empty() {
                    let geometry_type = validate_wkt(text, hint)
                        .map_err(|e| e.at("CSV", geometry_column, records))?;
                    geometry_types.insert(geometry_type);
                }
            } else {
                types[index] = types[index].widen(InferredType::of_text(value));
            }
        }
    };

    let fields: Vec<Field> = names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            if index == geometry_index {
                geometry_field(name, GeometryFormat::Wkt, true)
            } else {
                Field::new(name, types[index].data_type(), true)
            }
        })
        .collect();
    log::debug!(
        "Inferred CSV schema for {} from {records} record(s): {} field(s)",
        path.display(),
        fields.len()
    );

    Ok(CsvSchemaInference {
        schema: DatasetSchema::try_new(Arc::new(Schema::new(fields)))?,
        geometry_index,
        records,
        reached_eof,
        geometry_types,
    })
}
