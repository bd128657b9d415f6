//! CSV writer implementation for converting Arrow record batches to CSV format

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow_array::RecordBatch;
use arrow_cast::display::{ArrayFormatter, FormatOptions};
use geoetl_core_common::error::{IoErrorExt, Result, schema_incompatible};
use geoetl_core_common::io::create_sink;
use geoetl_core_common::{BatchWriter, DatasetSchema, GeometryFormat, WriteSummary};

/// Options for CSV writing
#[derive(Debug, Clone)]
pub struct CsvWriterOptions {
    /// Column delimiter (default: b',')
    pub delimiter: u8,
    /// Whether to write header row (default: true)
    pub has_header: bool,
    /// Null value representation (default: empty string)
    pub null_value: String,
    /// Output name of the geometry column, if it should be renamed
    pub geometry_column: Option<String>,
}

impl Default for CsvWriterOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            null_value: String::new(),
            geometry_column: None,
        }
    }
}

impl CsvWriterOptions {
    /// Create new writer options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set column delimiter
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to write header row
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set null value representation
    #[must_use]
    pub fn with_null_value(mut self, null_value: impl Into<String>) -> Self {
        self.null_value = null_value.into();
        self
    }

    /// Rename the geometry column on output
    #[must_use]
    pub fn with_geometry_column(mut self, name: impl Into<String>) -> Self {
        self.geometry_column = Some(name.into());
        self
    }
}

/// Writes batches as CSV rows, geometry as WKT text.
///
/// The file is written in place; a failure leaves the rows written so far.
pub struct CsvWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    options: CsvWriterOptions,
    record: Vec<String>,
    summary: WriteSummary,
}

impl CsvWriter {
    /// Creates the output file and writes the header.
    ///
    /// # Errors
    ///
    /// Fails with `SchemaIncompatible` if the schema has more than one geometry
    /// column or its geometry is not WKT, or if the file cannot be created.
    pub fn try_new(path: &Path, schema: &DatasetSchema, options: CsvWriterOptions) -> Result<Self> {
        schema.check_geometry_limit("CSV", Some(1))?;
        let geometry = schema.primary_geometry();
        if let Some(column) = geometry {
            if column.format != GeometryFormat::Wkt {
                return Err(schema_incompatible(
                    "CSV",
                    format!(
                        "geometry column '{}' must be WKT, found {}",
                        column.name, column.format
                    ),
                ));
            }
        } else if options.geometry_column.is_some() {
            log::warn!("Dataset has no geometry column; ignoring the CSV geometry column name");
        }

        let mut header: Vec<String> = schema
            .arrow_schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        if let (Some(column), Some(rename)) = (geometry, &options.geometry_column) {
            if header.iter().any(|name| name == rename) && &column.name != rename {
                return Err(schema_incompatible(
                    "CSV",
                    format!("cannot rename geometry column to '{rename}': field already exists"),
                ));
            }
            header[column.index].clone_from(rename);
        }

        let file = create_sink(path, "CSV")?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .from_writer(file);
        if options.has_header {
            writer
                .write_record(&header)
                .with_write_context("CSV", path)?;
        }
        log::debug!("Created CSV writer for {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            record: Vec::with_capacity(header.len()),
            options,
            summary: WriteSummary::default(),
        })
    }
}

impl BatchWriter for CsvWriter {
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let format = FormatOptions::default().with_null(&self.options.null_value);
        let formatters = batch
            .columns()
            .iter()
            .map(|array| ArrayFormatter::try_new(array.as_ref(), &format))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| schema_incompatible("CSV", format!("cannot format column: {e}")))?;

        for row in 0..batch.num_rows() {
            self.record.clear();
            for formatter in &formatters {
                let value = formatter
                    .value(row)
                    .try_to_string()
                    .map_err(|e| schema_incompatible("CSV", format!("cannot format value: {e}")))?;
                self.record.push(value);
            }
            self.writer
                .write_record(&self.record)
                .with_write_context("CSV", &self.path)?;
        }
        self.summary.record(batch);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<WriteSummary> {
        self.writer.flush().with_write_context("CSV", &self.path)?;
        log::debug!(
            "Wrote {} CSV row(s) in {} batch(es) to {}",
            self.summary.rows,
            self.summary.batches,
            self.path.display()
        );
        Ok(self.summary)
    }
}
