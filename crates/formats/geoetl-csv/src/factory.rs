//! Factory implementation for CSV format support.
//!
//! This module implements the `FormatFactory` trait to integrate CSV
//! with the driver registry.

use std::collections::BTreeMap;
use std::path::Path;

use geoetl_core_common::error::{ConfigError, Result};
use geoetl_core_common::options::{GEOMETRY_COLUMN, GEOMETRY_TYPE_HINT};
use geoetl_core_common::{
    BatchReader, BatchWriter, Capability, DatasetSchema, DatasetSummary, Driver, DriverOptions,
    FeatureCount, FormatFactory, GeometryFormat, OptionSpec, SupportStatus,
};

use crate::file_format::{CsvFormatOptions, infer_schema};
use crate::reader::CsvReader;
use crate::writer::{CsvWriter, CsvWriterOptions};

const CSV_OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        name: GEOMETRY_COLUMN,
        description: "Column holding WKT geometries; on write, the output name of the geometry column",
        required_for: &[Capability::Info, Capability::Read],
    },
    OptionSpec {
        name: GEOMETRY_TYPE_HINT,
        description: "Expected geometry type, used only to validate decoded values",
        required_for: &[],
    },
];

/// Descriptor of the CSV driver.
pub const CSV_DRIVER: Driver = Driver::new(
    "CSV",
    "Comma Separated Value (.csv)",
    SupportStatus::Supported,
    SupportStatus::Supported,
    SupportStatus::Supported,
)
.with_options(CSV_OPTIONS)
.with_max_geometry_columns(1);

/// Factory for creating CSV readers and writers.
#[derive(Debug, Clone)]
pub struct CsvFormatFactory {
    driver: Driver,
    options: CsvFormatOptions,
}

impl Default for CsvFormatFactory {
    fn default() -> Self {
        Self::new(CsvFormatOptions::default())
    }
}

impl CsvFormatFactory {
    /// Creates a factory reading with the given format options.
    #[must_use]
    pub fn new(options: CsvFormatOptions) -> Self {
        Self {
            driver: CSV_DRIVER,
            options,
        }
    }

    fn geometry_column<'a>(&self, options: &'a DriverOptions) -> Result<&'a str> {
        options.geometry_column.as_deref().ok_or_else(|| {
            ConfigError::MissingRequired {
                option: GEOMETRY_COLUMN.to_string(),
                driver: self.driver.short_name.to_string(),
            }
            .into()
        })
    }

    fn format_options(&self, options: &DriverOptions) -> CsvFormatOptions {
        self.options.clone().with_batch_size(options.batch_size)
    }
}

impl FormatFactory for CsvFormatFactory {
    fn driver(&self) -> &Driver {
        &self.driver
    }

    fn geometry_format(&self) -> GeometryFormat {
        GeometryFormat::Wkt
    }

    fn info(&self, path: &Path, options: &DriverOptions) -> Result<DatasetSummary> {
        let geometry_column = self.geometry_column(options)?;
        let inferred = infer_schema(
            path,
            &self.format_options(options),
            geometry_column,
            options.geometry_type,
        )?;
        Ok(DatasetSummary {
            schema: inferred.schema,
            geometry_types: BTreeMap::from([(geometry_column.to_string(), inferred.geometry_types)]),
            feature_count: Some(FeatureCount {
                count: inferred.records,
                exact: inferred.reached_eof,
            }),
        })
    }

    fn open_reader(&self, path: &Path, options: &DriverOptions) -> Result<Box<dyn BatchReader>> {
        let geometry_column = self.geometry_column(options)?;
        let reader = CsvReader::try_new(
            path,
            &self.format_options(options),
            geometry_column,
            options.geometry_type,
        )?;
        Ok(match options.geometry_format {
            Some(format) => Box::new(reader.with_geometry_format(format)),
            None => Box::new(reader),
        })
    }

    fn create_writer(
        &self,
        path: &Path,
        schema: &DatasetSchema,
        options: &DriverOptions,
    ) -> Result<Box<dyn BatchWriter>> {
        let mut writer_options = CsvWriterOptions::new().with_delimiter(self.options.delimiter);
        if let Some(name) = &options.geometry_column {
            writer_options = writer_options.with_geometry_column(name.clone());
        }
        Ok(Box::new(CsvWriter::try_new(path, schema, writer_options)?))
    }
}

#[cfg(test)]
mod tests {
    use geoetl_core_common::error::ErrorKind;

    use super::*;

    #[test]
    fn test_driver_descriptor() {
        let factory = CsvFormatFactory::default();
        let driver = factory.driver();
        assert_eq!(driver.short_name, "CSV");
        assert_eq!(driver.long_name, "Comma Separated Value (.csv)");
        assert_eq!(driver.max_geometry_columns, Some(1));
        assert_eq!(factory.geometry_format(), GeometryFormat::Wkt);
        assert!(
            driver
                .check_required_options(Capability::Write, &DriverOptions::default())
                .is_ok()
        );
    }

    #[test]
    fn test_read_requires_geometry_column() {
        let factory = CsvFormatFactory::default();
        let err = factory
            .open_reader(Path::new("does-not-matter.csv"), &DriverOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredOption);
        assert_eq!(err.exit_code(), 2);
    }
}
