//! I/O traits for streaming record batches in and out of a format.
//!
//! A [`BatchReader`] is a lazy, finite, non-restartable sequence of batches:
//! `Some(Ok(batch))` for data, `Some(Err(_))` for a failure (after which the
//! reader yields `None`), and `None` at the end. A [`BatchWriter`] consumes
//! batches in order and is finalized exactly once with [`BatchWriter::finish`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::ErrorKind as IoKind;
use std::path::Path;

use arrow_array::RecordBatch;

use crate::error::{GeoEtlError, IoError, Result};
use crate::geometry::GeometryType;
use crate::schema::DatasetSchema;

/// Trait for reading batches from a geospatial source.
pub trait BatchReader: Iterator<Item = Result<RecordBatch>> + Send {
    /// Schema every produced batch conforms to.
    fn schema(&self) -> &DatasetSchema;
}

/// Trait for writing batches to a geospatial sink.
pub trait BatchWriter: Send {
    /// Writes one batch, preserving row order.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be encoded or the sink fails.
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<()>;

    /// Flushes and closes the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be finalized.
    fn finish(self: Box<Self>) -> Result<WriteSummary>;
}

/// Totals reported by a writer after finalizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Number of batches written
    pub batches: usize,
    /// Number of rows written
    pub rows: usize,
}

impl WriteSummary {
    /// Accounts for one written batch.
    pub fn record(&mut self, batch: &RecordBatch) {
        self.batches += 1;
        self.rows += batch.num_rows();
    }
}

/// Number of features in a dataset and whether it is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureCount {
    /// Counted features
    pub count: u64,
    /// `false` when only a prefix of the source was read
    pub exact: bool,
}

/// Result of a driver's info operation.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    /// Resolved schema
    pub schema: DatasetSchema,
    /// Geometry types per geometry column, declared or observed in the sampled prefix
    pub geometry_types: BTreeMap<String, BTreeSet<GeometryType>>,
    /// Feature count, when known
    pub feature_count: Option<FeatureCount>,
}

fn map_open_error(err: std::io::Error, format: &str, path: &Path, write: bool) -> GeoEtlError {
    let path = path.to_path_buf();
    match err.kind() {
        IoKind::NotFound if !write => IoError::FileNotFound { path }.into(),
        IoKind::PermissionDenied => IoError::PermissionDenied { path }.into(),
        _ if write => IoError::Write {
            format: format.to_string(),
            path,
            source: Box::new(err),
        }
        .into(),
        _ => IoError::Read {
            format: format.to_string(),
            path,
            source: Box::new(err),
        }
        .into(),
    }
}

/// Opens a source file for reading.
///
/// # Errors
///
/// Returns `FileNotFound`, `PermissionDenied`, `InvalidPath` for directories,
/// or a read error.
pub fn open_source(path: &Path, format: &str) -> Result<File> {
    if path.is_dir() {
        return Err(IoError::InvalidPath {
            path: path.to_path_buf(),
            reason: "expected a file, found a directory".to_string(),
        }
        .into());
    }
    File::open(path).map_err(|e| map_open_error(e, format, path, false))
}

/// Creates (or truncates) a sink file.
///
/// # Errors
///
/// Returns `PermissionDenied` or a write error.
pub fn create_sink(path: &Path, format: &str) -> Result<File> {
    File::create(path).map_err(|e| map_open_error(e, format, path, true))
}
