//! `GeoJSON` driver.
//!
//! Reads `FeatureCollection` documents (or a single `Feature`) one feature at a
//! time. Properties become columns typed from a fixed prefix of features and
//! the geometry lands in a trailing `geometry` column holding `GeoJSON`
//! geometry objects. Feature `id`s are not carried over.
//!
//! Writes are not atomic: a failed or interrupted write leaves a truncated file
//! behind.

mod decoder;
mod factory;
mod parser;
mod reader;
mod writer;

pub use decoder::{DEFAULT_MAX_FEATURE_BYTES, FeatureScanner, RawFeature};
pub use factory::{GEOJSON_DRIVER, GeoJsonFormatFactory};
pub use parser::{FeatureRecord, GEOMETRY_COLUMN, PropertyInference, infer_value, parse_feature};
pub use reader::{
    DEFAULT_INFER_MAX_FEATURES, GeoJsonFormatOptions, GeoJsonReader, PrefixSummary,
};
pub use writer::GeoJsonWriter;
