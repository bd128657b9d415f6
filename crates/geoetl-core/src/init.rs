//! Registration of the built-in drivers.

use std::sync::Arc;

use geoetl_core_common::{DriverRegistry, Result};
use geoetl_csv::CsvFormatFactory;
use geoetl_geojson::GeoJsonFormatFactory;
use geoetl_geoparquet::GeoParquetFormatFactory;
use log::debug;

/// Builds a registry holding the CSV, GeoJSON and GeoParquet drivers, listed
/// in that order.
///
/// The returned registry is immutable and can be shared across threads.
///
/// # Errors
///
/// Fails only if two built-in drivers share a short name.
pub fn default_registry() -> Result<DriverRegistry> {
    let registry = DriverRegistry::builder()
        .register(Arc::new(CsvFormatFactory::default()))?
        .register(Arc::new(GeoJsonFormatFactory::default()))?
        .register(Arc::new(GeoParquetFormatFactory::default()))?
        .build();
    debug!("Registered drivers: {:?}", registry.driver_names());
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_order() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.driver_names(), vec!["CSV", "GeoJSON", "GeoParquet"]);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let registry = default_registry().unwrap();
        assert!(registry.resolve("GeoJSON").is_ok());
        assert!(registry.resolve("geojson").is_err());
        assert!(registry.resolve("csv").is_err());
    }
}
