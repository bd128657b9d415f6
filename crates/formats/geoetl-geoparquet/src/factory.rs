//! Factory implementation for `GeoParquet` format support.

use std::path::Path;

use geoetl_core_common::error::Result;
use geoetl_core_common::{
    BatchReader, BatchWriter, DatasetSchema, DatasetSummary, Driver, DriverOptions, FormatFactory,
    GeometryFormat, SupportStatus,
};

use crate::reader::{GeoParquetReader, read_footer};
use crate::writer::{GeoParquetWriter, GeoParquetWriterOptions};

/// Descriptor of the `GeoParquet` driver.
pub const GEOPARQUET_DRIVER: Driver = Driver::new(
    "GeoParquet",
    "GeoParquet (.parquet)",
    SupportStatus::Supported,
    SupportStatus::Supported,
    SupportStatus::Supported,
);

/// Factory for creating `GeoParquet` readers and writers.
#[derive(Debug, Clone)]
pub struct GeoParquetFormatFactory {
    driver: Driver,
    writer_options: GeoParquetWriterOptions,
}

impl Default for GeoParquetFormatFactory {
    fn default() -> Self {
        Self::new(GeoParquetWriterOptions::default())
    }
}

impl GeoParquetFormatFactory {
    #[must_use]
    pub fn new(writer_options: GeoParquetWriterOptions) -> Self {
        Self {
            driver: GEOPARQUET_DRIVER,
            writer_options,
        }
    }
}

impl FormatFactory for GeoParquetFormatFactory {
    fn driver(&self) -> &Driver {
        &self.driver
    }

    fn geometry_format(&self) -> GeometryFormat {
        GeometryFormat::Wkb
    }

    fn info(&self, path: &Path, _options: &DriverOptions) -> Result<DatasetSummary> {
        Ok(read_footer(path)?.summary())
    }

    fn open_reader(&self, path: &Path, options: &DriverOptions) -> Result<Box<dyn BatchReader>> {
        Ok(Box::new(GeoParquetReader::try_new(path, options.batch_size)?))
    }

    fn create_writer(
        &self,
        path: &Path,
        schema: &DatasetSchema,
        _options: &DriverOptions,
    ) -> Result<Box<dyn BatchWriter>> {
        Ok(Box::new(GeoParquetWriter::try_new(
            path,
            schema,
            &self.writer_options,
        )?))
    }
}
