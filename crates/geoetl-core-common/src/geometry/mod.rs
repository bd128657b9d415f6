//! Canonical in-memory geometry values and the codec between raw representations.
//!
//! A [`Geometry`] can be decoded from and encoded to WKT text, ISO WKB bytes, or a
//! `GeoJSON` geometry object. Decoding validates structure (minimum point counts,
//! closed rings, consistent dimensions) and never repairs input.
//!
//! ```
//! use geoetl_core_common::geometry::{Geometry, GeometryFormat, decode, encode};
//!
//! let point = Geometry::from_wkt("POINT (-74.006 40.7128)").unwrap();
//! let wkb = encode(&point, GeometryFormat::Wkb).unwrap();
//! assert_eq!(decode(&wkb, GeometryFormat::Wkb).unwrap(), point);
//! assert_eq!(point.to_wkt().unwrap(), "POINT(-74.006 40.7128)");
//! ```

mod array;
mod json;
mod processor;
mod wkb;
mod wkt;

use std::fmt;
use std::str::FromStr;

pub use array::{ValueError, decode_value, transcode_array};

use crate::error::{GeometryError, GeometryErrorKind};

/// Raw geometry representations understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryFormat {
    /// Well-known text
    Wkt,
    /// Well-known binary (ISO flavour on output)
    Wkb,
    /// `GeoJSON` geometry object serialized as JSON text
    GeoJson,
}

impl GeometryFormat {
    /// Returns the display name of the representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wkt => "WKT",
            Self::Wkb => "WKB",
            Self::GeoJson => "GeoJSON",
        }
    }
}

impl fmt::Display for GeometryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six supported geometry types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl GeometryType {
    /// All geometry types in WKB code order.
    pub const ALL: [GeometryType; 6] = [
        Self::Point,
        Self::LineString,
        Self::Polygon,
        Self::MultiPoint,
        Self::MultiLineString,
        Self::MultiPolygon,
    ];

    /// Returns the canonical (`GeoJSON`) type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
        }
    }

    /// Returns the base ISO WKB type code (1-6).
    #[must_use]
    pub fn wkb_code(&self) -> u32 {
        match self {
            Self::Point => 1,
            Self::LineString => 2,
            Self::Polygon => 3,
            Self::MultiPoint => 4,
            Self::MultiLineString => 5,
            Self::MultiPolygon => 6,
        }
    }

    /// Looks up a type by its base WKB code.
    #[must_use]
    pub fn from_wkb_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.wkb_code() == code)
    }

    /// Parses a type name ignoring ASCII case (`point`, `MULTIPOLYGON`, ...).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            format!(
                "unknown geometry type '{s}', expected one of: {}",
                Self::ALL.map(|t| t.as_str()).join(", ")
            )
        })
    }
}

/// A single position: longitude/x, latitude/y and an optional elevation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Coord {
    /// Creates a 2D coordinate.
    #[must_use]
    pub const fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// Creates a 3D coordinate.
    #[must_use]
    pub const fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_none_or(f64::is_finite)
    }
}

/// A line is an ordered sequence of positions; a polygon is a list of rings.
pub type Line = Vec<Coord>;
/// Rings of a polygon, exterior first.
pub type Rings = Vec<Line>;

/// Canonical geometry value.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    LineString(Line),
    Polygon(Rings),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Line>),
    MultiPolygon(Vec<Rings>),
}

impl Geometry {
    /// Returns the geometry type tag.
    #[must_use]
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Self::Point(_) => GeometryType::Point,
            Self::LineString(_) => GeometryType::LineString,
            Self::Polygon(_) => GeometryType::Polygon,
            Self::MultiPoint(_) => GeometryType::MultiPoint,
            Self::MultiLineString(_) => GeometryType::MultiLineString,
            Self::MultiPolygon(_) => GeometryType::MultiPolygon,
        }
    }

    /// Returns `true` if the coordinates carry an elevation.
    #[must_use]
    pub fn has_z(&self) -> bool {
        self.coords().next().is_some_and(|c| c.z.is_some())
    }

    /// Iterates over every coordinate in storage order.
    pub fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            Self::Point(c) => Box::new(std::iter::once(c)),
            Self::LineString(line) | Self::MultiPoint(line) => Box::new(line.iter()),
            Self::Polygon(rings) | Self::MultiLineString(rings) => Box::new(rings.iter().flatten()),
            Self::MultiPolygon(polygons) => Box::new(polygons.iter().flatten().flatten()),
        }
    }

    /// Returns `[min_x, min_y, max_x, max_y]`.
    #[must_use]
    pub fn bbox(&self) -> [f64; 4] {
        self.coords().fold(
            [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
            |[min_x, min_y, max_x, max_y], c| {
                [min_x.min(c.x), min_y.min(c.y), max_x.max(c.x), max_y.max(c.y)]
            },
        )
    }

    /// Checks the structural rules shared by all decoders.
    ///
    /// # Errors
    ///
    /// Returns a decode error of the matching kind when the geometry has no
    /// coordinates, mixes 2D and 3D positions, holds non-finite values, has a
    /// line with fewer than two points, or a ring that is short or not closed.
    pub fn validate(&self, format: GeometryFormat) -> Result<(), GeometryError> {
        let fail = |kind, detail: String| Err(GeometryError::decode(format, kind, detail));

        let mut coords = self.coords();
        let Some(first) = coords.next() else {
            return fail(
                GeometryErrorKind::EmptyCoordinates,
                format!("{} has no coordinates", self.geometry_type()),
            );
        };
        let has_z = first.z.is_some();
        for c in std::iter::once(first).chain(coords) {
            if c.z.is_some() != has_z {
                return fail(
                    GeometryErrorKind::InconsistentDimensions,
                    format!("{} mixes 2D and 3D positions", self.geometry_type()),
                );
            }
            if !c.is_finite() {
                return fail(
                    GeometryErrorKind::InvalidStructure,
                    format!("non-finite coordinate ({} {})", c.x, c.y),
                );
            }
        }

        let check_line = |line: &Line| {
            if line.len() < 2 {
                return fail(
                    GeometryErrorKind::InvalidStructure,
                    format!("line has {} position(s), at least 2 required", line.len()),
                );
            }
            Ok(())
        };
        let check_rings = |rings: &Rings| {
            if rings.is_empty() {
                return fail(
                    GeometryErrorKind::EmptyCoordinates,
                    "polygon has no rings".to_string(),
                );
            }
            for ring in rings {
                if ring.len() < 4 {
                    return fail(
                        GeometryErrorKind::InvalidStructure,
                        format!("ring has {} position(s), at least 4 required", ring.len()),
                    );
                }
                if ring.first() != ring.last() {
                    return fail(
                        GeometryErrorKind::InvalidStructure,
                        "ring is not closed".to_string(),
                    );
                }
            }
            Ok(())
        };
        let empty_member = |what: &str| {
            fail(
                GeometryErrorKind::EmptyCoordinates,
                format!("{} contains an empty {what}", self.geometry_type()),
            )
        };

        match self {
            Self::Point(_) | Self::MultiPoint(_) => Ok(()),
            Self::LineString(line) => check_line(line),
            Self::Polygon(rings) => check_rings(rings),
            Self::MultiLineString(lines) => {
                for line in lines {
                    if line.is_empty() {
                        return empty_member("line");
                    }
                    check_line(line)?;
                }
                Ok(())
            },
            Self::MultiPolygon(polygons) => {
                for rings in polygons {
                    if rings.iter().all(Vec::is_empty) {
                        return empty_member("polygon");
                    }
                    check_rings(rings)?;
                }
                Ok(())
            },
        }
    }

    /// Parses WKT text.
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError::Decode`] describing why the text was rejected.
    pub fn from_wkt(text: &str) -> Result<Self, GeometryError> {
        let geometry = wkt::parse(text)?;
        geometry.validate(GeometryFormat::Wkt)?;
        Ok(geometry)
    }

    /// Formats the geometry as WKT.
    ///
    /// # Errors
    ///
    /// Fails when the geometry has no coordinates or non-finite values.
    pub fn to_wkt(&self) -> Result<String, GeometryError> {
        self.check_encodable(GeometryFormat::Wkt)?;
        wkt::write(self)
    }

    /// Parses WKB bytes in either byte order.
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError::Decode`] describing why the buffer was rejected.
    pub fn from_wkb(bytes: &[u8]) -> Result<Self, GeometryError> {
        let geometry = wkb::read(bytes)?;
        geometry.validate(GeometryFormat::Wkb)?;
        Ok(geometry)
    }

    /// Encodes the geometry as little-endian ISO WKB.
    ///
    /// # Errors
    ///
    /// Fails when the geometry has no coordinates or non-finite values.
    pub fn to_wkb(&self) -> Result<Vec<u8>, GeometryError> {
        self.check_encodable(GeometryFormat::Wkb)?;
        wkb::write(self)
    }

    /// Parses `GeoJSON` geometry object text.
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError::Decode`] describing why the object was rejected.
    pub fn from_geojson_str(text: &str) -> Result<Self, GeometryError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            GeometryError::decode(
                GeometryFormat::GeoJson,
                GeometryErrorKind::InvalidStructure,
                format!("invalid JSON: {e}"),
            )
        })?;
        Self::from_geojson_value(value)
    }

    /// Maps a parsed JSON value holding a `GeoJSON` geometry object.
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError::Decode`] describing why the object was rejected.
    pub fn from_geojson_value(value: serde_json::Value) -> Result<Self, GeometryError> {
        let geometry = json::from_json_value(value)?;
        geometry.validate(GeometryFormat::GeoJson)?;
        Ok(geometry)
    }

    /// Maps a `geojson` crate geometry.
    ///
    /// # Errors
    ///
    /// Returns a [`GeometryError::Decode`] describing why the object was rejected.
    pub fn from_geojson(geometry: &::geojson::Geometry) -> Result<Self, GeometryError> {
        let geometry = json::from_geojson(geometry)?;
        geometry.validate(GeometryFormat::GeoJson)?;
        Ok(geometry)
    }

    /// Maps the geometry to a `geojson` crate geometry.
    ///
    /// # Errors
    ///
    /// Fails when the geometry has no coordinates or non-finite values, which
    /// JSON cannot represent.
    pub fn to_geojson(&self) -> Result<::geojson::Geometry, GeometryError> {
        self.check_encodable(GeometryFormat::GeoJson)?;
        Ok(json::to_geojson(self))
    }

    /// Serializes the geometry as `GeoJSON` object text.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Geometry::to_geojson`].
    pub fn to_geojson_string(&self) -> Result<String, GeometryError> {
        let geometry = self.to_geojson()?;
        serde_json::to_string(&geometry)
            .map_err(|e| GeometryError::encode(GeometryFormat::GeoJson, e.to_string()))
    }

    fn check_encodable(&self, format: GeometryFormat) -> Result<(), GeometryError> {
        let mut coords = self.coords().peekable();
        if coords.peek().is_none() {
            return Err(GeometryError::encode(
                format,
                format!("{} has no coordinates", self.geometry_type()),
            ));
        }
        if let Some(c) = coords.find(|c| !c.is_finite()) {
            return Err(GeometryError::encode(
                format,
                format!("non-finite coordinate ({} {})", c.x, c.y),
            ));
        }
        Ok(())
    }
}

/// Decodes a raw value in the given representation.
///
/// WKT and `GeoJSON` values must be UTF-8 text.
///
/// # Errors
///
/// Returns a [`GeometryError::Decode`] with a kind specific to the failure.
pub fn decode(raw: &[u8], format: GeometryFormat) -> Result<Geometry, GeometryError> {
    let text = || {
        std::str::from_utf8(raw).map_err(|e| {
            let kind = match format {
                GeometryFormat::Wkt => GeometryErrorKind::MalformedWkt,
                _ => GeometryErrorKind::InvalidStructure,
            };
            GeometryError::decode(format, kind, format!("invalid UTF-8: {e}"))
        })
    };
    match format {
        GeometryFormat::Wkt => Geometry::from_wkt(text()?),
        GeometryFormat::Wkb => Geometry::from_wkb(raw),
        GeometryFormat::GeoJson => Geometry::from_geojson_str(text()?),
    }
}

/// Encodes a geometry into the given representation.
///
/// # Errors
///
/// Returns a [`GeometryError::Encode`] when the geometry cannot be represented.
pub fn encode(geometry: &Geometry, format: GeometryFormat) -> Result<Vec<u8>, GeometryError> {
    match format {
        GeometryFormat::Wkt => geometry.to_wkt().map(String::into_bytes),
        GeometryFormat::Wkb => geometry.to_wkb(),
        GeometryFormat::GeoJson => geometry.to_geojson_string().map(String::into_bytes),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One sample per geometry type, 2D and 3D.
    pub(crate) fn samples() -> Vec<Geometry> {
        let square = vec![
            Coord::xy(0.0, 0.0),
            Coord::xy(10.0, 0.0),
            Coord::xy(10.0, 10.0),
            Coord::xy(0.0, 10.0),
            Coord::xy(0.0, 0.0),
        ];
        let hole = vec![
            Coord::xy(2.0, 2.0),
            Coord::xy(2.0, 4.0),
            Coord::xy(4.0, 4.0),
            Coord::xy(2.0, 2.0),
        ];
        vec![
            Geometry::Point(Coord::xy(-74.006, 40.712_812_345_678_9)),
            Geometry::Point(Coord::xyz(1.5, -2.25, 100.125)),
            Geometry::LineString(vec![
                Coord::xy(0.1, 0.2),
                Coord::xy(0.300_000_000_000_000_04, 1e-7),
                Coord::xy(-180.0, 90.0),
            ]),
            Geometry::Polygon(vec![square.clone(), hole.clone()]),
            Geometry::MultiPoint(vec![Coord::xyz(1.0, 2.0, 3.0), Coord::xyz(4.0, 5.0, 6.0)]),
            Geometry::MultiLineString(vec![
                vec![Coord::xy(1.0, 1.0), Coord::xy(2.0, 2.0)],
                vec![Coord::xy(3.0, 3.0), Coord::xy(4.0, 4.0), Coord::xy(5.0, 3.0)],
            ]),
            Geometry::MultiPolygon(vec![vec![square], vec![hole]]),
        ]
    }

    #[test]
    fn test_roundtrip_all_formats() {
        for geometry in samples() {
            for format in [GeometryFormat::Wkt, GeometryFormat::Wkb, GeometryFormat::GeoJson] {
                let raw = encode(&geometry, format).unwrap();
                let back = decode(&raw, format).unwrap();
                assert_eq!(back, geometry, "{format} roundtrip of {geometry:?}");
            }
        }
    }

    #[test]
    fn test_geometry_type_names() {
        assert_eq!(GeometryType::from_name("multipolygon"), Some(GeometryType::MultiPolygon));
        assert_eq!(GeometryType::from_name(" Point "), Some(GeometryType::Point));
        assert!(GeometryType::from_name("GeometryCollection").is_none());
        assert!("Triangle".parse::<GeometryType>().is_err());
        assert_eq!(GeometryType::from_wkb_code(5), Some(GeometryType::MultiLineString));
    }

    #[test]
    fn test_validate_rejects_unclosed_ring() {
        let ring = vec![
            Coord::xy(0.0, 0.0),
            Coord::xy(1.0, 0.0),
            Coord::xy(1.0, 1.0),
            Coord::xy(0.0, 1.0),
        ];
        let err = Geometry::Polygon(vec![ring])
            .validate(GeometryFormat::Wkt)
            .unwrap_err();
        assert_eq!(err.decode_kind(), Some(GeometryErrorKind::InvalidStructure));
    }

    #[test]
    fn test_validate_rejects_mixed_dimensions() {
        let line = Geometry::LineString(vec![Coord::xy(0.0, 0.0), Coord::xyz(1.0, 1.0, 1.0)]);
        let err = line.validate(GeometryFormat::GeoJson).unwrap_err();
        assert_eq!(
            err.decode_kind(),
            Some(GeometryErrorKind::InconsistentDimensions)
        );
    }

    #[test]
    fn test_encode_rejects_empty_and_nan() {
        let err = Geometry::MultiPoint(vec![]).to_wkb().unwrap_err();
        assert!(matches!(err, GeometryError::Encode { .. }));

        let err = Geometry::Point(Coord::xy(f64::NAN, 0.0))
            .to_geojson_string()
            .unwrap_err();
        assert!(matches!(
            err,
            GeometryError::Encode {
                format: GeometryFormat::GeoJson,
                ..
            }
        ));
    }

    #[test]
    fn test_bbox() {
        let geometry = Geometry::LineString(vec![Coord::xy(-1.0, 5.0), Coord::xy(3.0, -2.0)]);
        assert_eq!(geometry.bbox(), [-1.0, -2.0, 3.0, 5.0]);
    }
}
