//! Driver descriptors: names, capabilities and option schemas.
//!
//! A [`Driver`] describes what a format adapter can do. It is owned by the
//! registry entry of its format and borrowed by operations for the duration of
//! a single conversion or inspection.

use std::fmt;

use crate::error::{ConfigError, DriverError, Result};
use crate::options::DriverOptions;

/// Support status for a specific driver operation.
///
/// Indicates whether a driver operation (info, read, or write) is currently supported,
/// planned for future implementation, or not supported at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportStatus {
    /// The feature is fully supported and implemented.
    Supported,
    /// The feature is not supported by the driver.
    NotSupported,
    /// The feature is planned for future implementation.
    Planned,
}

impl SupportStatus {
    /// Returns `true` if the operation is fully supported and implemented.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, SupportStatus::Supported)
    }

    /// Returns the string representation of this support status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            SupportStatus::Supported => "Supported",
            SupportStatus::NotSupported => "Not Supported",
            SupportStatus::Planned => "Planned",
        }
    }
}

/// One of the operations a driver may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Schema and metadata inspection
    Info,
    /// Streaming batches out of a source
    Read,
    /// Streaming batches into a sink
    Write,
}

impl Capability {
    /// Gerund used in error messages ("reading", "writing", ...).
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Capability::Info => "inspecting metadata",
            Capability::Read => "reading",
            Capability::Write => "writing",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Info => "Info",
            Capability::Read => "Read",
            Capability::Write => "Write",
        })
    }
}

/// Capabilities supported by a geospatial data format driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverCapabilities {
    /// Support status for reading dataset metadata and information.
    pub info: SupportStatus,
    /// Support status for reading data from this format.
    pub read: SupportStatus,
    /// Support status for writing data to this format.
    pub write: SupportStatus,
}

impl DriverCapabilities {
    /// Returns the status of one capability.
    #[must_use]
    pub fn status(&self, capability: Capability) -> SupportStatus {
        match capability {
            Capability::Info => self.info,
            Capability::Read => self.read,
            Capability::Write => self.write,
        }
    }
}

/// A format-specific option a driver understands.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Option key as used in the options map (e.g. `geometryColumn`)
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Capabilities for which the option must be present
    pub required_for: &'static [Capability],
}

/// Geospatial data format driver definition.
///
/// Short names are case-sensitive identifiers: `GeoJSON` and `geojson` are
/// different names, and only the former is registered.
#[derive(Debug, Clone)]
pub struct Driver {
    /// Short name used in the CLI and for driver identification (e.g., `"GeoJSON"`).
    pub short_name: &'static str,
    /// Long descriptive name for display purposes.
    pub long_name: &'static str,
    /// Operations supported by this driver (info, read, write).
    pub capabilities: DriverCapabilities,
    /// Options the driver recognizes.
    pub options: &'static [OptionSpec],
    /// Maximum number of geometry columns the writer accepts, `None` for no limit.
    pub max_geometry_columns: Option<usize>,
}

impl Driver {
    /// Creates a new driver definition with specified capabilities.
    #[must_use]
    pub const fn new(
        short_name: &'static str,
        long_name: &'static str,
        info: SupportStatus,
        read: SupportStatus,
        write: SupportStatus,
    ) -> Self {
        Self {
            short_name,
            long_name,
            capabilities: DriverCapabilities { info, read, write },
            options: &[],
            max_geometry_columns: None,
        }
    }

    /// Declares the options this driver understands.
    #[must_use]
    pub const fn with_options(mut self, options: &'static [OptionSpec]) -> Self {
        self.options = options;
        self
    }

    /// Limits the number of geometry columns accepted on write.
    #[must_use]
    pub const fn with_max_geometry_columns(mut self, max: usize) -> Self {
        self.max_geometry_columns = Some(max);
        self
    }

    /// Fails unless `capability` is fully supported.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::OperationNotSupported`].
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.capabilities.status(capability).is_supported() {
            Ok(())
        } else {
            Err(DriverError::OperationNotSupported {
                driver: self.short_name.to_string(),
                operation: capability.operation().to_string(),
            }
            .into())
        }
    }

    /// Fails if an option required for `capability` is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] naming the first missing option.
    pub fn check_required_options(
        &self,
        capability: Capability,
        options: &DriverOptions,
    ) -> Result<()> {
        for spec in self.options {
            if spec.required_for.contains(&capability) && !options.has(spec.name) {
                return Err(ConfigError::MissingRequired {
                    option: spec.name.to_string(),
                    driver: self.short_name.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}
