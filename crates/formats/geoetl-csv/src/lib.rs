//! CSV driver.
//!
//! Every column is a scalar field except the designated geometry column, whose
//! values are WKT text. Readers can be asked to emit that column as WKB or
//! `GeoJSON` instead, so each cell is decoded only once. Column types are inferred from a bounded prefix of the
//! file; see [`CsvFormatOptions::schema_infer_max_rec`].
//!
//! Writes are not atomic: a failed or interrupted write leaves a truncated file
//! behind.

mod factory;
mod file_format;
mod geospatial;
mod reader;
mod writer;

pub use factory::{CSV_DRIVER, CsvFormatFactory};
pub use file_format::{CsvFormatOptions, CsvSchemaInference, infer_schema};
pub use geospatial::{decode_wkt, validate_wkt};
pub use reader::CsvReader;
pub use writer::{CsvWriter, CsvWriterOptions};
