//! Streaming CSV reader producing Arrow record batches.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow_array::{ArrayRef, RecordBatch};
use csv::StringRecord;
use geoetl_core_common::error::{GeoEtlError, IoError, Result, schema_incompatible};
use geoetl_core_common::geometry::{GeometryFormat, GeometryType};
use geoetl_core_common::io::open_source;
use geoetl_core_common::{BatchReader, DatasetSchema};
use geoetl_format_shared::{ColumnBuilder, SourcePosition};

use crate::file_format::{CsvFormatOptions, infer_schema};
use crate::geospatial::WktColumnBuilder;

/// Maps a `csv` crate error to the error taxonomy, keeping its position.
pub(crate) fn csv_error(err: csv::Error, path: &Path) -> GeoEtlError {
    let position = err
        .position()
        .map(|pos| SourcePosition {
            line: Some(pos.line()),
            record: Some(pos.record()),
            byte_offset: Some(pos.byte()),
            column: None,
        })
        .unwrap_or_default();
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => IoError::Read {
            format: "CSV".to_string(),
            path: path.to_path_buf(),
            source: Box::new(source),
        }
        .into(),
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => position.parse_error(
            "CSV",
            format!("expected {expected_len} fields, found {len}"),
        ),
        _ => position.parse_error("CSV", message),
    }
}

enum ColumnSlot {
    Scalar(ColumnBuilder),
    Geometry(WktColumnBuilder),
}

/// Lazily reads a CSV file in batches of `batch_size` records.
pub struct CsvReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    schema: DatasetSchema,
    columns: Vec<ColumnSlot>,
    record: StringRecord,
    batch_size: usize,
    rows: u64,
    done: bool,
}

impl CsvReader {
    /// Infers the schema from the leading records, then opens the file for
    /// streaming.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the schema cannot be inferred.
    pub fn try_new(
        path: &Path,
        options: &CsvFormatOptions,
        geometry_column: &str,
        hint: Option<GeometryType>,
    ) -> Result<Self> {
        let inferred = infer_schema(path, options, geometry_column, hint)?;
        let batch_size = options.batch_size.max(1);

        let columns = inferred
            .schema
            .arrow_schema()
            .fields()
            .iter()
            .enumerate()
            .map(|(index, field)| {
                if index == inferred.geometry_index {
                    Ok(ColumnSlot::Geometry(WktColumnBuilder::new(
                        field.name(),
                        hint,
                        batch_size,
                    )))
                } else {
                    ColumnBuilder::new(field.data_type(), batch_size)
                        .map(ColumnSlot::Scalar)
                        .ok_or_else(|| {
                            schema_incompatible(
                                "CSV",
                                format!("unsupported column type {}", field.data_type()),
                            )
                        })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let reader = options.reader(open_source(path, "CSV")?);
        log::debug!(
            "Opened CSV reader for {} (batch size {batch_size})",
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            schema: inferred.schema,
            columns,
            record: StringRecord::new(),
            batch_size,
            rows: 0,
            done: false,
        })
    }

    /// Emits the geometry column in `format` rather than as WKT text.
    #[must_use]
    pub fn with_geometry_format(mut self, format: GeometryFormat) -> Self {
        self.schema = self.schema.with_geometry_format(format);
        for slot in &mut self.columns {
            if let ColumnSlot::Geometry(column) = slot {
                column.set_format(format);
            }
        }
        self
    }

    fn append_record(&mut self) -> Result<()> {
        let row = self.rows;
        let fields = self.schema.arrow_schema().fields();
        for (index, (slot, value)) in self.columns.iter_mut().zip(self.record.iter()).enumerate() {
            match slot {
                ColumnSlot::Geometry(column) => column.append(value, row)?,
                ColumnSlot::Scalar(column) => column.append_text(value).map_err(|mismatch| {
                    schema_incompatible(
                        "CSV",
                        format!(
                            "value '{value}' in field '{}' at row {row} does not match the type {} inferred from the leading records",
                            fields[index].name(),
                            mismatch.expected
                        ),
                    )
                })?,
            }
        }
        Ok(())
    }

    fn read_batch(&mut self) -> Result<Option<RecordBatch>> {
        let mut count = 0;
        while count < self.batch_size {
            let more = self
                .reader
                .read_record(&mut self.record)
                .map_err(|e| csv_error(e, &self.path))?;
            if !more {
                break;
            }
            self.rows += 1;
            count += 1;
            self.append_record()?;
        }
        if count == 0 {
            return Ok(None);
        }

        let arrays: Vec<ArrayRef> = self
            .columns
            .iter_mut()
            .map(|slot| match slot {
                ColumnSlot::Scalar(column) => column.finish(),
                ColumnSlot::Geometry(column) => column.finish(),
            })
            .collect();
        let batch = RecordBatch::try_new(self.schema.arrow_schema().clone(), arrays)
            .map_err(|e| schema_incompatible("CSV", e.to_string()))?;
        log::debug!("Read CSV batch of {count} row(s) from {}", self.path.display());
        Ok(Some(batch))
    }
}

impl Iterator for CsvReader {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.done = true;
                log::debug!("Finished reading {} CSV row(s)", self.rows);
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}

impl BatchReader for CsvReader {
    fn schema(&self) -> &DatasetSchema {
        &self.schema
    }
}
