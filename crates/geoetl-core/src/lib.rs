//! `geoetl-core` is the core library for the `GeoETL` project.
//!
//! This crate includes:
//! - **Driver Registry**: [`init::default_registry`] builds the registry of the
//!   built-in CSV, GeoJSON and GeoParquet drivers.
//! - **Conversion Pipeline**: a streaming, batch-at-a-time state machine that
//!   moves a dataset from one driver to another ([`pipeline`]).
//! - **ETL Operations**: `convert`, `info` and `list_drivers`, the entry points
//!   used by the CLI ([`operations`]).
//!
//! The error taxonomy lives in `geoetl-core-common` and is re-exported here as
//! [`error`].

pub mod init;
pub mod operations;
pub mod pipeline;
pub mod types;
pub mod utils;

pub use geoetl_core_common::{error, options};
pub use geoetl_core_common::{
    Capability, Driver, DriverOptions, DriverRegistry, FeatureCount, GeoEtlError, GeometryFormat,
    GeometryType, Result, SupportStatus,
};
