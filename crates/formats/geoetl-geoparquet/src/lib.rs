//! `GeoParquet` driver.
//!
//! Geometry columns are WKB binary columns described by the `geo` footer
//! metadata. Scalar columns keep their native Parquet/Arrow types. Info reads
//! only the footer. Writes are atomic: the output appears only once the
//! footer has been written.

mod factory;
mod metadata;
mod reader;
mod writer;

pub use factory::{GEOPARQUET_DRIVER, GeoParquetFormatFactory};
pub use metadata::{GEO_METADATA_KEY, GEOPARQUET_VERSION, GeoParquetMetadata, GeometryColumnMetadata};
pub use reader::{GeoParquetReader, ParquetFooter, read_footer};
pub use writer::{GeoParquetWriter, GeoParquetWriterOptions};
