//! Format factories and the driver registry.
//!
//! Each format crate provides one [`FormatFactory`]. A [`DriverRegistry`] is
//! built once from a set of factories and is read-only afterwards, so a single
//! instance can be shared (e.g. behind an `Arc`) by concurrent conversions.
//!
//! Lookup by name is exact and **case-sensitive**: `GeoJSON` resolves, `geojson`
//! does not.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::drivers::{Capability, Driver};
use crate::error::{DriverError, GeoEtlError, Result};
use crate::geometry::GeometryFormat;
use crate::io::{BatchReader, BatchWriter, DatasetSummary};
use crate::options::DriverOptions;
use crate::schema::DatasetSchema;

fn unsupported(driver: &Driver, capability: Capability) -> GeoEtlError {
    DriverError::OperationNotSupported {
        driver: driver.short_name.to_string(),
        operation: capability.operation().to_string(),
    }
    .into()
}

/// Format-specific adapter behind the common Info/Read/Write contract.
///
/// Operations a driver does not offer keep the default implementation, which
/// fails with `CapabilityUnsupported`.
pub trait FormatFactory: Send + Sync {
    /// Descriptor of this driver.
    fn driver(&self) -> &Driver;

    /// Geometry representation the format stores natively. Writers expect
    /// geometry columns in this representation.
    fn geometry_format(&self) -> GeometryFormat;

    /// Reads the schema and summary metadata without a full scan.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot be opened or its schema cannot be resolved.
    fn info(&self, path: &Path, options: &DriverOptions) -> Result<DatasetSummary> {
        let _ = (path, options);
        Err(unsupported(self.driver(), Capability::Info))
    }

    /// Opens a lazy batch reader over the source.
    ///
    /// # Errors
    ///
    /// Fails if the source cannot be opened or its schema cannot be resolved.
    fn open_reader(&self, path: &Path, options: &DriverOptions) -> Result<Box<dyn BatchReader>> {
        let _ = (path, options);
        Err(unsupported(self.driver(), Capability::Read))
    }

    /// Creates a writer for batches conforming to `schema`.
    ///
    /// # Errors
    ///
    /// Fails if the schema cannot be represented or the sink cannot be created.
    fn create_writer(
        &self,
        path: &Path,
        schema: &DatasetSchema,
        options: &DriverOptions,
    ) -> Result<Box<dyn BatchWriter>> {
        let _ = (path, schema, options);
        Err(unsupported(self.driver(), Capability::Write))
    }
}

/// Builder collecting factories before the registry is frozen.
#[derive(Default)]
pub struct DriverRegistryBuilder {
    factories: Vec<Arc<dyn FormatFactory>>,
}

impl DriverRegistryBuilder {
    /// Adds a factory.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::AlreadyRegistered`] if the short name is taken.
    pub fn register(mut self, factory: Arc<dyn FormatFactory>) -> Result<Self> {
        let name = factory.driver().short_name;
        if self
            .factories
            .iter()
            .any(|f| f.driver().short_name == name)
        {
            return Err(DriverError::AlreadyRegistered {
                driver: name.to_string(),
            }
            .into());
        }
        log::debug!("Registered driver {name}");
        self.factories.push(factory);
        Ok(self)
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> DriverRegistry {
        DriverRegistry {
            factories: self.factories,
        }
    }
}

/// Immutable catalog of drivers, in registration order.
#[derive(Clone)]
pub struct DriverRegistry {
    factories: Vec<Arc<dyn FormatFactory>>,
}

impl DriverRegistry {
    /// Starts an empty registry.
    #[must_use]
    pub fn builder() -> DriverRegistryBuilder {
        DriverRegistryBuilder::default()
    }

    /// Finds a driver by exact, case-sensitive short name.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::NotFound`] listing the registered names. When a
    /// name matches ignoring case, the error names it as a hint.
    pub fn resolve(&self, name: &str) -> Result<&dyn FormatFactory> {
        if let Some(factory) = self
            .factories
            .iter()
            .find(|f| f.driver().short_name == name)
        {
            return Ok(factory.as_ref());
        }
        let hint = self
            .factories
            .iter()
            .map(|f| f.driver().short_name)
            .find(|n| n.eq_ignore_ascii_case(name))
            .map(str::to_string);
        Err(DriverError::NotFound {
            name: name.to_string(),
            available: self.driver_names().join(", "),
            hint,
        }
        .into())
    }

    /// All driver descriptors in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<&Driver> {
        self.factories.iter().map(|f| f.driver()).collect()
    }

    /// Driver short names in registration order.
    #[must_use]
    pub fn driver_names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.driver().short_name).collect()
    }

    /// Number of registered drivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no driver is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.driver_names())
            .finish()
    }
}
