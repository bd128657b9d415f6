//! Request options shared by all drivers.
//!
//! Callers hand a string map to [`DriverOptions::from_map`]; drivers consume the
//! typed result. Batch size is a tuning parameter only and never affects the
//! rows produced.

use std::collections::BTreeMap;

use crate::error::{ConfigError, Result};
use crate::geometry::{GeometryFormat, GeometryType};

/// Option key selecting the geometry column of row-oriented formats.
pub const GEOMETRY_COLUMN: &str = "geometryColumn";
/// Option key holding a geometry type used to pre-validate decoded values.
pub const GEOMETRY_TYPE_HINT: &str = "geometryTypeHint";
/// Option key overriding the streaming batch size.
pub const BATCH_SIZE: &str = "batchSize";

/// Default number of rows per record batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Typed driver options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    /// Name of the geometry column for row-oriented formats
    pub geometry_column: Option<String>,
    /// Expected geometry type, validation only
    pub geometry_type: Option<GeometryType>,
    /// Rows per record batch
    pub batch_size: usize,
    /// Representation a reader that decodes geometry while reading should
    /// emit. Set by the conversion pipeline, never read from the option map.
    pub geometry_format: Option<GeometryFormat>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            geometry_column: None,
            geometry_type: None,
            batch_size: DEFAULT_BATCH_SIZE,
            geometry_format: None,
        }
    }
}

impl DriverOptions {
    /// Builds options from a configuration map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for unknown keys and malformed values.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                GEOMETRY_COLUMN => {
                    if value.trim().is_empty() {
                        return Err(invalid(key, "must not be empty"));
                    }
                    options.geometry_column = Some(value.clone());
                },
                GEOMETRY_TYPE_HINT => {
                    let geometry_type = value
                        .parse::<GeometryType>()
                        .map_err(|message| invalid(key, &message))?;
                    options.geometry_type = Some(geometry_type);
                },
                BATCH_SIZE => {
                    options.batch_size = match value.parse::<usize>() {
                        Ok(size) if size > 0 => size,
                        _ => {
                            return Err(invalid(
                                key,
                                &format!("expected a positive integer, got '{value}'"),
                            ));
                        },
                    };
                },
                _ => {
                    return Err(invalid(
                        key,
                        &format!(
                            "unrecognized option, expected one of: {GEOMETRY_COLUMN}, {GEOMETRY_TYPE_HINT}, {BATCH_SIZE}"
                        ),
                    ));
                },
            }
        }
        Ok(options)
    }

    /// Sets the geometry column name.
    #[must_use]
    pub fn with_geometry_column(mut self, name: impl Into<String>) -> Self {
        self.geometry_column = Some(name.into());
        self
    }

    /// Sets the geometry type hint.
    #[must_use]
    pub fn with_geometry_type(mut self, geometry_type: GeometryType) -> Self {
        self.geometry_type = Some(geometry_type);
        self
    }

    /// Sets the batch size; zero is clamped to one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Asks readers to emit decoded geometry in `format`.
    #[must_use]
    pub fn with_geometry_format(mut self, format: GeometryFormat) -> Self {
        self.geometry_format = Some(format);
        self
    }

    /// Returns `true` if the option named by its map key is set.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        match key {
            GEOMETRY_COLUMN => self.geometry_column.is_some(),
            GEOMETRY_TYPE_HINT => self.geometry_type.is_some(),
            BATCH_SIZE => true,
            _ => false,
        }
    }
}

fn invalid(option: &str, message: &str) -> crate::error::GeoEtlError {
    ConfigError::InvalidOption {
        option: option.to_string(),
        message: message.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_from_map() {
        let options = DriverOptions::from_map(&map(&[
            ("geometryColumn", "wkt"),
            ("geometryTypeHint", "point"),
            ("batchSize", "100"),
        ]))
        .unwrap();
        assert_eq!(options.geometry_column.as_deref(), Some("wkt"));
        assert_eq!(options.geometry_type, Some(GeometryType::Point));
        assert_eq!(options.batch_size, 100);
    }

    #[test]
    fn test_defaults() {
        let options = DriverOptions::from_map(&BTreeMap::new()).unwrap();
        assert_eq!(options, DriverOptions::default());
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
        assert!(!options.has(GEOMETRY_COLUMN));
    }

    #[test]
    fn test_invalid_values() {
        for pairs in [
            [("geometryTypeHint", "Circle")],
            [("batchSize", "0")],
            [("batchSize", "many")],
            [("geometryColumn", " ")],
            [("geometry_column", "wkt")],
        ] {
            let err = DriverOptions::from_map(&map(&pairs)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidOption, "{pairs:?}");
            assert_eq!(err.exit_code(), 2);
        }
    }
}
