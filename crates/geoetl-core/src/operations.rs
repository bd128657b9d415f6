//! Core ETL operations: dataset conversion, inspection and driver listing.
//!
//! These functions are synchronous and only borrow the registry, so the same
//! [`DriverRegistry`] can serve any number of concurrent calls.

use std::path::Path;

use geoetl_core_common::error::Result;
use geoetl_core_common::{Capability, Driver, DriverOptions, DriverRegistry};
use log::info;

use crate::pipeline::{ConversionRequest, Pipeline};
use crate::types::{ConversionSummary, DatasetInfo, FieldInfo, GeometryColumnInfo};
use crate::utils::field_type_label;

/// Converts geospatial data from one format to another.
///
/// Batches are streamed from the input driver to the output driver, so memory
/// use is bounded by the batch size rather than the dataset size. Geometry is
/// re-encoded into the representation the output format stores.
///
/// # Arguments
///
/// * `registry` - Drivers available for the conversion
/// * `input` - Path to the input file
/// * `output` - Path to the output file
/// * `input_driver` - Exact, case-sensitive short name of the input driver
/// * `output_driver` - Exact, case-sensitive short name of the output driver
/// * `options` - Driver options, applied to both sides
///
/// # Errors
///
/// Returns an error annotated with the failing pipeline stage if either
/// driver is unknown or lacks the needed capability, a required option is
/// missing, the input cannot be read, a geometry cannot be re-encoded, or the
/// output cannot be written.
pub fn convert(
    registry: &DriverRegistry,
    input: &Path,
    output: &Path,
    input_driver: &str,
    output_driver: &str,
    options: &DriverOptions,
) -> Result<ConversionSummary> {
    let request = ConversionRequest::new(input, output, input_driver, output_driver)
        .with_options(options.clone());
    Pipeline::new(registry, request).run()
}

/// Displays information about a geospatial dataset.
///
/// Reads the schema and the summary metadata the driver can get without a
/// full scan.
///
/// # Errors
///
/// Returns an error if the driver is unknown or cannot describe datasets, a
/// required option is missing, or the dataset cannot be opened.
pub fn info(
    registry: &DriverRegistry,
    input: &Path,
    driver: &str,
    options: &DriverOptions,
) -> Result<DatasetInfo> {
    let factory = registry.resolve(driver)?;
    let descriptor = factory.driver();
    descriptor.require(Capability::Info)?;
    descriptor.check_required_options(Capability::Info, options)?;

    info!("Reading dataset info from {} ({driver})", input.display());
    let summary = factory.info(input, options)?;

    let geometry_columns = summary
        .schema
        .geometry_columns()
        .iter()
        .map(|column| GeometryColumnInfo {
            name: column.name.clone(),
            encoding: column.format.to_string(),
            geometry_types: summary
                .geometry_types
                .get(&column.name)
                .map(|types| types.iter().copied().collect())
                .unwrap_or_default(),
            crs: column.crs.clone(),
        })
        .collect();

    let fields = summary
        .schema
        .arrow_schema()
        .fields()
        .iter()
        .map(|field| FieldInfo {
            name: field.name().clone(),
            data_type: field_type_label(field),
            nullable: field.is_nullable(),
        })
        .collect();

    Ok(DatasetInfo {
        dataset: input.display().to_string(),
        driver: descriptor.short_name.to_string(),
        driver_long_name: descriptor.long_name.to_string(),
        geometry_columns,
        fields,
        feature_count: summary.feature_count,
    })
}

/// Lists the registered drivers in registration order.
#[must_use]
pub fn list_drivers(registry: &DriverRegistry) -> Vec<Driver> {
    registry.list().into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use geoetl_core_common::error::ErrorKind;
    use tempfile::TempDir;

    use super::*;
    use crate::init::default_registry;

    #[test]
    fn test_list_drivers() {
        let registry = default_registry().unwrap();
        let drivers = list_drivers(&registry);
        let names: Vec<_> = drivers.iter().map(|d| d.short_name).collect();
        assert_eq!(names, vec!["CSV", "GeoJSON", "GeoParquet"]);
        for driver in &drivers {
            assert!(driver.capabilities.info.is_supported());
            assert!(driver.capabilities.read.is_supported());
            assert!(driver.capabilities.write.is_supported());
        }
    }

    #[test]
    fn test_info_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cities.csv");
        fs::write(
            &path,
            "name,population,wkt\nSpringfield,167000,POINT(-89.65 39.78)\nShelbyville,23000,POINT(-88.8 39.4)\n",
        )
        .unwrap();

        let registry = default_registry().unwrap();
        let info = info(
            &registry,
            &path,
            "CSV",
            &DriverOptions::default().with_geometry_column("wkt"),
        )
        .unwrap();
        assert_eq!(info.driver, "CSV");
        assert_eq!(info.feature_count_label(), "2");
        assert_eq!(info.geometry_columns.len(), 1);
        assert_eq!(info.geometry_columns[0].name, "wkt");
        assert_eq!(info.geometry_columns[0].encoding, "WKT");
        assert_eq!(info.geometry_columns[0].geometry_type_label(), "Point");
        let fields: Vec<_> = info
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.data_type.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("name", "String"),
                ("population", "Int64"),
                ("wkt", "Geometry (WKT)")
            ]
        );
    }

    #[test]
    fn test_info_requires_geometry_column_for_csv() {
        let registry = default_registry().unwrap();
        let err = info(
            &registry,
            Path::new("does-not-exist.csv"),
            "CSV",
            &DriverOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredOption);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_info_missing_file() {
        let registry = default_registry().unwrap();
        let err = info(
            &registry,
            Path::new("does-not-exist.geojson"),
            "GeoJSON",
            &DriverOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceNotFound);
        assert_eq!(err.exit_code(), 1);
    }
}
