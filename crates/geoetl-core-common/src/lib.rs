//! Common types and traits shared across `GeoETL` crates.
//!
//! This crate provides the core abstractions that are shared between
//! `geoetl-core` and format implementation crates, preventing circular dependencies:
//! the error taxonomy, the geometry codec, the schema model, driver descriptors
//! and options, the batch I/O traits, and the driver registry.

pub mod drivers;
pub mod error;
pub mod factory;
pub mod geometry;
pub mod io;
pub mod options;
pub mod schema;

// Re-export commonly used types
pub use drivers::{Capability, Driver, DriverCapabilities, OptionSpec, SupportStatus};
pub use error::{GeoEtlError, Result};
pub use factory::{DriverRegistry, DriverRegistryBuilder, FormatFactory};
pub use geometry::{Geometry, GeometryFormat, GeometryType};
pub use io::{BatchReader, BatchWriter, DatasetSummary, FeatureCount, WriteSummary};
pub use options::DriverOptions;
pub use schema::DatasetSchema;
