//! Custom error types for `GeoETL` operations.
//!
//! Every failure surfaced by a driver, the geometry codec, or the conversion
//! pipeline is one of the enums below. [`GeoEtlError::kind`] classifies an error
//! into the user-facing taxonomy and [`GeoEtlError::exit_code`] maps it onto the
//! process outcome classes (1 for general failures, 2 for invalid requests).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::geometry::{GeometryFormat, GeometryType};

/// Main error type for `GeoETL` operations.
///
/// It uses `#[error(transparent)]` to delegate display formatting to the
/// underlying error variants, except for [`GeoEtlError::Stage`] which prefixes
/// the failing pipeline stage.
#[derive(Debug, Error)]
pub enum GeoEtlError {
    /// Driver-related errors (not found, unsupported operations, etc.)
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// I/O errors (file read/write, path issues, permissions)
    #[error(transparent)]
    Io(#[from] IoError),

    /// Format parsing and validation errors
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Geometry codec errors
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error annotated with the pipeline stage it occurred in
    #[error("{stage} failed: {source}")]
    Stage {
        /// The stage that failed
        stage: PipelineStage,
        /// The underlying error
        #[source]
        source: Box<GeoEtlError>,
    },

    /// Generic errors from dependencies
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Driver-related errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Driver was not found in the registry
    #[error("Driver '{name}' not found. Available drivers: {available}{}", hint.as_ref().map(|h| format!(" (did you mean '{h}'? driver names are case-sensitive)")).unwrap_or_default())]
    NotFound {
        /// The requested driver name
        name: String,
        /// Comma-separated list of available drivers
        available: String,
        /// A registered name that matches ignoring case, if any
        hint: Option<String>,
    },

    /// Driver does not support the requested operation
    #[error("Driver '{driver}' does not support {operation}")]
    OperationNotSupported {
        /// The driver name
        driver: String,
        /// The operation that's not supported (e.g., "reading", "writing")
        operation: String,
    },

    /// A driver with the same short name was registered twice
    #[error("Driver '{driver}' is already registered")]
    AlreadyRegistered {
        /// The driver name
        driver: String,
    },
}

/// I/O related errors.
#[derive(Debug, Error)]
pub enum IoError {
    /// Failed to read from a file
    #[error("Failed to read {format} file '{path}': {source}")]
    Read {
        /// The format being read (e.g., "CSV", "`GeoJSON`")
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to write to a file
    #[error("Failed to write {format} file '{path}': {source}")]
    Write {
        /// The format being written
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Path is invalid
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path
        path: PathBuf,
        /// Why the path is invalid
        reason: String,
    },

    /// File was not found
    #[error("File not found: '{path}'")]
    FileNotFound {
        /// The missing file path
        path: PathBuf,
    },

    /// Permission was denied
    #[error("Permission denied for '{path}'")]
    PermissionDenied {
        /// The path with permission issues
        path: PathBuf,
    },
}

/// Format parsing and validation errors.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Failed to parse a format
    #[error("Failed to parse {format} at {}: {message}", position.as_deref().unwrap_or("unknown position"))]
    Parse {
        /// The format being parsed
        format: String,
        /// Human readable position of the failure (e.g. "line 3")
        position: Option<String>,
        /// Description of the parse error
        message: String,
    },

    /// The data cannot be represented with the resolved schema
    #[error("Incompatible schema for {format}: {reason}")]
    SchemaIncompatible {
        /// The format
        format: String,
        /// Why the schema is incompatible
        reason: String,
    },

    /// A geometry value in a specific row could not be decoded or encoded
    #[error("Invalid geometry in {format} column '{column}' (row {row}): {source}")]
    InvalidGeometry {
        /// The format
        format: String,
        /// The geometry column
        column: String,
        /// 1-based row number within the dataset
        row: u64,
        /// The codec error
        #[source]
        source: GeometryError,
    },
}

/// Distinct failure classes of the geometry codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryErrorKind {
    /// WKT text does not follow the `TYPE(coordinates)` grammar
    MalformedWkt,
    /// A WKB buffer ended before the geometry was complete
    TruncatedWkb,
    /// The geometry type tag is unknown or not supported
    UnsupportedType,
    /// Coordinates within one geometry mix 2D and 3D positions
    InconsistentDimensions,
    /// A geometry has no coordinates where at least one is required
    EmptyCoordinates,
    /// The nesting or point counts are structurally invalid
    InvalidStructure,
    /// The decoded type differs from the expected geometry type
    UnexpectedType,
}

impl GeometryErrorKind {
    /// Returns a short label for the error kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedWkt => "malformed WKT",
            Self::TruncatedWkb => "truncated WKB",
            Self::UnsupportedType => "unsupported geometry type",
            Self::InconsistentDimensions => "inconsistent coordinate dimensions",
            Self::EmptyCoordinates => "empty coordinates",
            Self::InvalidStructure => "invalid structure",
            Self::UnexpectedType => "unexpected geometry type",
        }
    }
}

impl fmt::Display for GeometryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the geometry codec.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A raw value could not be decoded into a geometry
    #[error("Failed to decode {format} geometry ({kind}): {detail}")]
    Decode {
        /// The raw representation being decoded
        format: GeometryFormat,
        /// The failure class
        kind: GeometryErrorKind,
        /// Description including the offending value where practical
        detail: String,
    },

    /// A geometry could not be encoded into a raw representation
    #[error("Failed to encode geometry as {format}: {detail}")]
    Encode {
        /// The target representation
        format: GeometryFormat,
        /// Description of the problem
        detail: String,
    },
}

impl GeometryError {
    pub(crate) fn decode(
        format: GeometryFormat,
        kind: GeometryErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self::Decode {
            format,
            kind,
            detail: detail.into(),
        }
    }

    pub(crate) fn encode(format: GeometryFormat, detail: impl Into<String>) -> Self {
        Self::Encode {
            format,
            detail: detail.into(),
        }
    }

    /// Builds the error for a geometry whose type differs from a type hint.
    #[must_use]
    pub fn unexpected_type(
        format: GeometryFormat,
        expected: GeometryType,
        found: GeometryType,
    ) -> Self {
        Self::decode(
            format,
            GeometryErrorKind::UnexpectedType,
            format!("expected {expected}, found {found}"),
        )
    }

    /// Returns the decode failure class, or `None` for encode errors.
    #[must_use]
    pub fn decode_kind(&self) -> Option<GeometryErrorKind> {
        match self {
            Self::Decode { kind, .. } => Some(*kind),
            Self::Encode { .. } => None,
        }
    }

    /// Attaches the column and row the geometry came from.
    #[must_use]
    pub fn at(self, format: &str, column: &str, row: u64) -> GeoEtlError {
        FormatError::InvalidGeometry {
            format: format.to_string(),
            column: column.to_string(),
            row,
            source: self,
        }
        .into()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid or unrecognized option
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },

    /// Required option is missing
    #[error("Missing required option '{option}' for driver '{driver}'")]
    MissingRequired {
        /// The missing option name
        option: String,
        /// The driver that requires it
        driver: String,
    },
}

/// Pipeline stages used to annotate failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Resolving drivers and opening the input source
    OpenInput,
    /// Reading the input schema and preparing the output
    ResolveSchema,
    /// Moving batches from input to output
    Stream,
    /// Flushing and closing the output
    FinalizeOutput,
}

impl PipelineStage {
    /// Returns the stage name as shown to users.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenInput => "open input",
            Self::ResolveSchema => "resolve schema",
            Self::Stream => "stream",
            Self::FinalizeOutput => "finalize output",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user-facing error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DriverNotFound,
    CapabilityUnsupported,
    SourceNotFound,
    PermissionDenied,
    MissingRequiredOption,
    InvalidOption,
    SchemaIncompatible,
    GeometryDecode,
    GeometryEncode,
    IoFailure,
    Other,
}

/// Type alias for Results using `GeoEtlError`.
pub type Result<T> = std::result::Result<T, GeoEtlError>;

impl GeoEtlError {
    /// Wraps this error with the stage it happened in. Already-staged errors
    /// keep their original stage.
    #[must_use]
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        match self {
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping stage annotations.
    #[must_use]
    pub fn root(&self) -> &GeoEtlError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the failing stage, if the error was annotated with one.
    #[must_use]
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Classifies the error into the user-facing taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            Self::Driver(DriverError::NotFound { .. }) => ErrorKind::DriverNotFound,
            Self::Driver(DriverError::OperationNotSupported { .. }) => {
                ErrorKind::CapabilityUnsupported
            },
            Self::Driver(DriverError::AlreadyRegistered { .. }) | Self::Other(_) => {
                ErrorKind::Other
            },
            Self::Io(IoError::FileNotFound { .. }) => ErrorKind::SourceNotFound,
            Self::Io(IoError::PermissionDenied { .. }) => ErrorKind::PermissionDenied,
            Self::Io(_) | Self::Format(FormatError::Parse { .. }) => ErrorKind::IoFailure,
            Self::Format(FormatError::SchemaIncompatible { .. }) => ErrorKind::SchemaIncompatible,
            Self::Format(FormatError::InvalidGeometry { source, .. }) | Self::Geometry(source) => {
                match source {
                    GeometryError::Decode { .. } => ErrorKind::GeometryDecode,
                    GeometryError::Encode { .. } => ErrorKind::GeometryEncode,
                }
            },
            Self::Config(ConfigError::MissingRequired { .. }) => ErrorKind::MissingRequiredOption,
            Self::Config(ConfigError::InvalidOption { .. }) => ErrorKind::InvalidOption,
            Self::Stage { .. } => ErrorKind::Other,
        }
    }

    /// Process exit code for this error: 2 for invalid requests, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::DriverNotFound
            | ErrorKind::CapabilityUnsupported
            | ErrorKind::MissingRequiredOption
            | ErrorKind::InvalidOption => 2,
            _ => 1,
        }
    }

    /// Get a user-friendly error message.
    ///
    /// Staged errors are prefixed with the stage that failed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Driver(e) => e.user_message(),
            Self::Io(e) => e.user_message(),
            Self::Format(e) => e.to_string(),
            Self::Geometry(e) => e.to_string(),
            Self::Config(e) => format!("Configuration error: {e}"),
            Self::Stage { stage, source } => {
                format!("Failed during '{stage}': {}", source.user_message())
            },
            Self::Other(e) => format!("Error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self.root() {
            Self::Driver(e) => e.recovery_suggestion(),
            Self::Io(e) => e.recovery_suggestion(),
            Self::Format(e) => e.recovery_suggestion(),
            Self::Config(ConfigError::MissingRequired { option, .. })
                if option == "geometryColumn" =>
            {
                Some("Pass --geometry-column with the name of the WKT column.".to_string())
            },
            _ => None,
        }
    }
}

impl DriverError {
    fn user_message(&self) -> String {
        match self {
            Self::NotFound {
                name,
                available,
                hint,
            } => {
                let mut message = format!(
                    "Driver '{name}' not found.\n\nAvailable drivers:\n{}",
                    available
                        .split(", ")
                        .map(|d| format!("  - {d}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                );
                if let Some(hint) = hint {
                    message.push_str(&format!(
                        "\n\nDriver names are case-sensitive: did you mean '{hint}'?"
                    ));
                }
                message
            },
            Self::OperationNotSupported { driver, operation } => {
                format!("The '{driver}' driver does not support {operation}.")
            },
            Self::AlreadyRegistered { .. } => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::NotFound { .. } => {
                Some("Run 'geoetl drivers' to see all available drivers.".to_string())
            },
            Self::OperationNotSupported { .. } => {
                Some("Try using a different driver that supports this operation.".to_string())
            },
            Self::AlreadyRegistered { .. } => None,
        }
    }
}

impl IoError {
    fn user_message(&self) -> String {
        match self {
            Self::Read {
                format,
                path,
                source,
            } => {
                format!("Failed to read {format} file {}: {source}", path.display())
            },
            Self::Write {
                format,
                path,
                source,
            } => {
                format!("Failed to write {format} file {}: {source}", path.display())
            },
            Self::FileNotFound { path } => {
                format!("File not found: {}", path.display())
            },
            _ => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::FileNotFound { .. } => {
                Some("Check that the file path is correct and the file exists.".to_string())
            },
            Self::PermissionDenied { .. } => {
                Some("Check file permissions and ensure you have access.".to_string())
            },
            Self::InvalidPath { .. } => {
                Some("Ensure the path is valid and properly formatted.".to_string())
            },
            _ => None,
        }
    }
}

impl FormatError {
    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Parse { .. } => Some("Check the file format and ensure it's valid.".to_string()),
            Self::InvalidGeometry { .. } => {
                Some("Validate geometries using a GIS tool before importing.".to_string())
            },
            Self::SchemaIncompatible { .. } => None,
        }
    }
}

/// Extension trait for adding I/O context to errors.
pub trait IoErrorExt<T> {
    /// Add read context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Read`] if the underlying operation fails.
    fn with_read_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;

    /// Add write context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Write`] if the underlying operation fails.
    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> IoErrorExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_read_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            GeoEtlError::Io(IoError::Read {
                format: format.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }

    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            GeoEtlError::Io(IoError::Write {
                format: format.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }
}

/// Shorthand for [`FormatError::SchemaIncompatible`].
#[must_use]
pub fn schema_incompatible(format: &str, reason: impl Into<String>) -> GeoEtlError {
    FormatError::SchemaIncompatible {
        format: format.to_string(),
        reason: reason.into(),
    }
    .into()
}
