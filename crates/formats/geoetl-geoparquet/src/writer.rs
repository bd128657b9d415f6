//! Atomic `GeoParquet` writer.
//!
//! Row groups go to a temporary file next to the target. The `geo` metadata
//! is appended when the writer is finished, then the file is renamed into
//! place. Dropping an unfinished writer removes the temporary file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_schema::Schema;
use geoetl_core_common::error::{IoErrorExt, Result, schema_incompatible};
use geoetl_core_common::geometry::decode_value;
use geoetl_core_common::schema::PRIMARY_GEOMETRY_KEY;
use geoetl_core_common::{BatchWriter, DatasetSchema, GeometryFormat, WriteSummary};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use tempfile::NamedTempFile;

use crate::metadata::{ColumnStats, GEO_METADATA_KEY, GEOPARQUET_VERSION, GeoParquetMetadata};

/// `GeoParquet` writer configuration.
#[derive(Debug, Clone)]
pub struct GeoParquetWriterOptions {
    /// Column chunk compression (default: SNAPPY)
    pub compression: Compression,
    /// Maximum rows per row group (default: 8192)
    pub max_row_group_size: usize,
}

impl Default for GeoParquetWriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            max_row_group_size: 8192,
        }
    }
}

impl GeoParquetWriterOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_max_row_group_size(mut self, rows: usize) -> Self {
        self.max_row_group_size = rows.max(1);
        self
    }

    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.max_row_group_size)
            .build()
    }
}

/// Streams record batches into a `GeoParquet` file.
pub struct GeoParquetWriter {
    path: PathBuf,
    writer: ArrowWriter<NamedTempFile>,
    schema: DatasetSchema,
    file_schema: Arc<Schema>,
    stats: Vec<ColumnStats>,
    summary: WriteSummary,
}

impl GeoParquetWriter {
    /// Creates the temporary file and the Parquet writer.
    ///
    /// # Errors
    ///
    /// Fails with `SchemaIncompatible` if a geometry column is not WKB, or
    /// with a write error if the temporary file cannot be created.
    pub fn try_new(path: &Path, schema: &DatasetSchema, options: &GeoParquetWriterOptions) -> Result<Self> {
        if let Some(column) = schema
            .geometry_columns()
            .iter()
            .find(|c| c.format != GeometryFormat::Wkb)
        {
            return Err(schema_incompatible(
                "GeoParquet",
                format!(
                    "geometry column '{}' must hold WKB, found {}",
                    column.name, column.format
                ),
            ));
        }

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = tempfile::Builder::new()
            .prefix(".geoetl-")
            .suffix(".parquet.tmp")
            .tempfile_in(directory)
            .with_write_context("GeoParquet", path)?;

        let arrow_schema = schema.arrow_schema();
        let mut metadata = arrow_schema.metadata().clone();
        metadata.remove(GEO_METADATA_KEY);
        metadata.remove(PRIMARY_GEOMETRY_KEY);
        let file_schema = Arc::new(Schema::new_with_metadata(
            arrow_schema.fields().clone(),
            metadata,
        ));
        let writer = ArrowWriter::try_new(staging, Arc::clone(&file_schema), Some(options.properties()))
            .with_write_context("GeoParquet", path)?;
        log::debug!(
            "Created GeoParquet writer for {} ({} geometry column(s))",
            path.display(),
            schema.geometry_columns().len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            schema: schema.clone(),
            file_schema,
            stats: vec![ColumnStats::default(); schema.geometry_columns().len()],
            summary: WriteSummary::default(),
        })
    }

    fn observe(&mut self, batch: &RecordBatch) -> Result<()> {
        for (column, stats) in self.schema.geometry_columns().iter().zip(&mut self.stats) {
            let array = batch.column(column.index);
            for row in 0..batch.num_rows() {
                let row_number = (self.summary.rows + row + 1) as u64;
                if let Some(geometry) = decode_value(array.as_ref(), row, GeometryFormat::Wkb)
                    .map_err(|e| e.at("GeoParquet", &column.name, row_number))?
                {
                    stats.observe(&geometry);
                }
            }
        }
        Ok(())
    }

    fn geo_metadata(&self) -> Option<GeoParquetMetadata> {
        let primary = self.schema.primary_geometry()?;
        let columns = self
            .schema
            .geometry_columns()
            .iter()
            .zip(&self.stats)
            .map(|(column, stats)| (column.name.clone(), stats.to_metadata(column.crs.as_deref())))
            .collect::<BTreeMap<_, _>>();
        Some(GeoParquetMetadata {
            version: GEOPARQUET_VERSION.to_string(),
            primary_column: primary.name.clone(),
            columns,
        })
    }
}

impl BatchWriter for GeoParquetWriter {
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        self.observe(batch)?;
        let batch = RecordBatch::try_new(Arc::clone(&self.file_schema), batch.columns().to_vec())
            .map_err(|e| schema_incompatible("GeoParquet", e.to_string()))?;
        self.writer
            .write(&batch)
            .with_write_context("GeoParquet", &self.path)?;
        self.summary.record(&batch);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<WriteSummary> {
        match self.geo_metadata() {
            Some(geo) => {
                let json = geo.to_json()?;
                self.writer
                    .append_key_value_metadata(KeyValue::new(GEO_METADATA_KEY.to_string(), json));
            },
            None => log::warn!(
                "No geometry column to describe, writing {} as plain Parquet",
                self.path.display()
            ),
        }
        let Self {
            path,
            writer,
            summary,
            ..
        } = *self;
        let staging = writer
            .into_inner()
            .with_write_context("GeoParquet", &path)?;
        staging
            .as_file()
            .sync_all()
            .with_write_context("GeoParquet", &path)?;
        staging
            .persist(&path)
            .with_write_context("GeoParquet", &path)?;
        log::debug!("Wrote {} GeoParquet row(s) to {}", summary.rows, path.display());
        Ok(summary)
    }
}
