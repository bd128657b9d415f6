//! Factory implementation for `GeoJSON` format support.

use std::collections::BTreeMap;
use std::path::Path;

use geoetl_core_common::error::Result;
use geoetl_core_common::{
    BatchReader, BatchWriter, DatasetSchema, DatasetSummary, Driver, DriverOptions, FeatureCount,
    FormatFactory, GeometryFormat, SupportStatus,
};

use crate::parser::GEOMETRY_COLUMN;
use crate::reader::{GeoJsonFormatOptions, GeoJsonReader};
use crate::writer::GeoJsonWriter;

/// Descriptor of the `GeoJSON` driver.
pub const GEOJSON_DRIVER: Driver = Driver::new(
    "GeoJSON",
    "GeoJSON (.geojson)",
    SupportStatus::Supported,
    SupportStatus::Supported,
    SupportStatus::Supported,
)
.with_max_geometry_columns(1);

/// Factory for creating `GeoJSON` readers and writers.
#[derive(Debug, Clone)]
pub struct GeoJsonFormatFactory {
    driver: Driver,
    options: GeoJsonFormatOptions,
}

impl Default for GeoJsonFormatFactory {
    fn default() -> Self {
        Self::new(GeoJsonFormatOptions::default())
    }
}

impl GeoJsonFormatFactory {
    #[must_use]
    pub fn new(options: GeoJsonFormatOptions) -> Self {
        Self {
            driver: GEOJSON_DRIVER,
            options,
        }
    }

    fn reader(&self, path: &Path, options: &DriverOptions) -> Result<GeoJsonReader> {
        let options = self.options.clone().with_batch_size(options.batch_size);
        GeoJsonReader::try_new(path, &options)
    }
}

impl FormatFactory for GeoJsonFormatFactory {
    fn driver(&self) -> &Driver {
        &self.driver
    }

    fn geometry_format(&self) -> GeometryFormat {
        GeometryFormat::GeoJson
    }

    fn info(&self, path: &Path, options: &DriverOptions) -> Result<DatasetSummary> {
        let reader = self.reader(path, options)?;
        let prefix = reader.prefix();
        Ok(DatasetSummary {
            schema: reader.schema().clone(),
            geometry_types: BTreeMap::from([(
                GEOMETRY_COLUMN.to_string(),
                prefix.geometry_types.clone(),
            )]),
            feature_count: Some(FeatureCount {
                count: prefix.features,
                exact: prefix.reached_eof,
            }),
        })
    }

    fn open_reader(&self, path: &Path, options: &DriverOptions) -> Result<Box<dyn BatchReader>> {
        Ok(Box::new(self.reader(path, options)?))
    }

    fn create_writer(
        &self,
        path: &Path,
        schema: &DatasetSchema,
        _options: &DriverOptions,
    ) -> Result<Box<dyn BatchWriter>> {
        Ok(Box::new(GeoJsonWriter::try_new(path, schema)?))
    }
}
