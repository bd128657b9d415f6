//! `GeoParquet` reader.
//!
//! Columns listed in the `geo` footer metadata become WKB geometry columns;
//! every other column keeps its native Arrow type.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use geoetl_core_common::error::{IoErrorExt, Result, schema_incompatible};
use geoetl_core_common::io::open_source;
use geoetl_core_common::schema::{
    CRS_KEY, EXTENSION_NAME_KEY, JSON_EXTENSION, PRIMARY_GEOMETRY_KEY, geometry_field,
};
use geoetl_core_common::{BatchReader, DatasetSchema, DatasetSummary, FeatureCount, GeometryFormat};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use crate::metadata::{GEO_METADATA_KEY, GeoParquetMetadata};

/// What the footer says about a file, read without touching any row group.
#[derive(Debug, Clone)]
pub struct ParquetFooter {
    pub schema: DatasetSchema,
    pub num_rows: u64,
    /// `None` for plain Parquet files
    pub geo: Option<GeoParquetMetadata>,
}

impl ParquetFooter {
    /// Summary for the info operation: exact row count and declared types.
    #[must_use]
    pub fn summary(&self) -> DatasetSummary {
        let geometry_types = self
            .geo
            .iter()
            .flat_map(|geo| geo.columns.iter())
            .map(|(name, column)| (name.clone(), column.declared_types()))
            .collect::<BTreeMap<_, _>>();
        DatasetSummary {
            schema: self.schema.clone(),
            geometry_types,
            feature_count: Some(FeatureCount {
                count: self.num_rows,
                exact: true,
            }),
        }
    }
}

fn is_binary(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Binary | DataType::LargeBinary | DataType::BinaryView
    )
}

/// Builds the dataset schema from the Arrow schema stored in the file.
fn resolve_schema(schema: &Schema, geo: Option<&GeoParquetMetadata>) -> Result<DatasetSchema> {
    let columns = geo.map(|g| &g.columns);
    if let Some(columns) = columns {
        if let Some(missing) = columns
            .keys()
            .find(|name| schema.field_with_name(name).is_err())
        {
            return Err(schema_incompatible(
                "GeoParquet",
                format!("geometry column '{missing}' listed in the 'geo' metadata does not exist"),
            ));
        }
    }

    let fields = schema
        .fields()
        .iter()
        .map(|field| match columns.and_then(|c| c.get(field.name())) {
            Some(column) => {
                if !is_binary(field.data_type()) {
                    return Err(schema_incompatible(
                        "GeoParquet",
                        format!(
                            "geometry column '{}' has type {}, expected binary WKB",
                            field.name(),
                            field.data_type()
                        ),
                    ));
                }
                let mut field = geometry_field(field.name(), GeometryFormat::Wkb, field.is_nullable());
                if let Some(crs) = column.crs_text() {
                    let mut metadata = field.metadata().clone();
                    metadata.insert(CRS_KEY.to_string(), crs);
                    field = field.with_metadata(metadata);
                }
                Ok(field)
            },
            None => {
                // only columns named in 'geo' are geometry
                let mut metadata = field.metadata().clone();
                metadata.remove(CRS_KEY);
                if metadata.get(EXTENSION_NAME_KEY).map(String::as_str) != Some(JSON_EXTENSION) {
                    metadata.remove(EXTENSION_NAME_KEY);
                }
                Ok(field.as_ref().clone().with_metadata(metadata))
            },
        })
        .collect::<Result<Vec<Field>>>()?;

    let mut metadata: HashMap<String, String> = schema.metadata().clone();
    metadata.remove(GEO_METADATA_KEY);
    metadata.remove(PRIMARY_GEOMETRY_KEY);
    if let Some(geo) = geo {
        metadata.insert(PRIMARY_GEOMETRY_KEY.to_string(), geo.primary_column.clone());
    }
    DatasetSchema::try_new(Arc::new(Schema::new_with_metadata(fields, metadata)))
}

fn open(path: &Path) -> Result<(ParquetRecordBatchReaderBuilder<File>, ParquetFooter)> {
    let file = open_source(path, "GeoParquet")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).with_read_context("GeoParquet", path)?;
    let file_metadata = builder.metadata().file_metadata();
    let geo = file_metadata
        .key_value_metadata()
        .and_then(|kv| kv.iter().find(|entry| entry.key == GEO_METADATA_KEY))
        .and_then(|entry| entry.value.as_deref())
        .map(GeoParquetMetadata::parse)
        .transpose()?;
    let num_rows = u64::try_from(file_metadata.num_rows()).unwrap_or_default();
    if geo.is_none() {
        log::debug!("{} has no 'geo' metadata, reading it as a plain table", path.display());
    }
    let schema = resolve_schema(builder.schema(), geo.as_ref())?;
    Ok((
        builder,
        ParquetFooter {
            schema,
            num_rows,
            geo,
        },
    ))
}

/// Reads only the footer of a `GeoParquet` file.
///
/// # Errors
///
/// Fails if the file cannot be opened, is not Parquet, or carries `geo`
/// metadata that cannot be honored.
pub fn read_footer(path: &Path) -> Result<ParquetFooter> {
    open(path).map(|(_, footer)| footer)
}

/// Streams the row groups of a `GeoParquet` file as record batches.
pub struct GeoParquetReader {
    path: PathBuf,
    inner: ParquetRecordBatchReader,
    schema: DatasetSchema,
    rows: u64,
    done: bool,
}

impl GeoParquetReader {
    /// Opens the file and resolves its schema from the footer.
    ///
    /// # Errors
    ///
    /// Same as [`read_footer`].
    pub fn try_new(path: &Path, batch_size: usize) -> Result<Self> {
        let (builder, footer) = open(path)?;
        let inner = builder
            .with_batch_size(batch_size.max(1))
            .build()
            .with_read_context("GeoParquet", path)?;
        log::debug!(
            "Opened GeoParquet file {} with {} row(s)",
            path.display(),
            footer.num_rows
        );
        Ok(Self {
            path: path.to_path_buf(),
            inner,
            schema: footer.schema,
            rows: 0,
            done: false,
        })
    }

    fn convert(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let columns = batch
            .columns()
            .iter()
            .enumerate()
            .map(|(index, array)| {
                if self.schema.geometry_at(index).is_some() && array.data_type() != &DataType::Binary {
                    arrow_cast::cast(array, &DataType::Binary).with_read_context("GeoParquet", &self.path)
                } else {
                    Ok(Arc::clone(array))
                }
            })
            .collect::<Result<Vec<ArrayRef>>>()?;
        RecordBatch::try_new(Arc::clone(self.schema.arrow_schema()), columns)
            .with_read_context("GeoParquet", &self.path)
    }
}

impl Iterator for GeoParquetReader {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.inner.next() {
            Some(Ok(batch)) => self.convert(&batch),
            Some(Err(e)) => Err(e).with_read_context("GeoParquet", &self.path),
            None => {
                self.done = true;
                log::debug!("Finished reading {} GeoParquet row(s)", self.rows);
                return None;
            },
        };
        match &result {
            Ok(batch) => self.rows += batch.num_rows() as u64,
            Err(_) => self.done = true,
        }
        Some(result)
    }
}

impl BatchReader for GeoParquetReader {
    fn schema(&self) -> &DatasetSchema {
        &self.schema
    }
}
