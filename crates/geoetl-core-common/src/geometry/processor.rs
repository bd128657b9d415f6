//! Bridges [`Geometry`] and geozero's event-driven readers and writers.

use geozero::error::{GeozeroError, Result as GeozeroResult};
use geozero::{CoordDimensions, GeomProcessor, GeozeroGeometry};

use super::{Coord, Geometry, GeometryFormat, GeometryType, Line, Rings};
use crate::error::{GeometryError, GeometryErrorKind};

/// Assembles a [`Geometry`] from the events of a geozero reader.
///
/// Events for types outside the six supported ones are rejected, and the
/// rejection is kept so [`GeometryBuilder::finish`] can report its kind.
pub(super) struct GeometryBuilder {
    format: GeometryFormat,
    root: Option<GeometryType>,
    coords: Vec<Coord>,
    lines: Vec<Line>,
    polygons: Vec<Rings>,
    failure: Option<GeometryError>,
}

impl GeometryBuilder {
    pub(super) fn new(format: GeometryFormat) -> Self {
        Self {
            format,
            root: None,
            coords: Vec::new(),
            lines: Vec::new(),
            polygons: Vec::new(),
            failure: None,
        }
    }

    fn reject(&mut self, kind: GeometryErrorKind, detail: impl Into<String>) -> GeozeroResult<()> {
        let detail = detail.into();
        self.failure = Some(GeometryError::decode(self.format, kind, detail.clone()));
        Err(GeozeroError::Geometry(detail))
    }

    fn unsupported(&mut self, what: &str) -> GeozeroResult<()> {
        self.reject(
            GeometryErrorKind::UnsupportedType,
            format!("unsupported geometry type {what}"),
        )
    }

    fn begin(&mut self, geometry_type: GeometryType) -> GeozeroResult<()> {
        if self.root.is_none() {
            self.root = Some(geometry_type);
        }
        Ok(())
    }

    /// Untagged lines and polygons only occur as members.
    fn member(&mut self, what: &str) -> GeozeroResult<()> {
        if self.root.is_none() {
            return self.unsupported(what);
        }
        Ok(())
    }

    fn push(&mut self, coord: Coord) -> GeozeroResult<()> {
        if self.root.is_none() {
            return self.unsupported("without a supported container");
        }
        self.coords.push(coord);
        Ok(())
    }

    /// Returns the assembled geometry, or the first failure: a rejection
    /// recorded by this builder wins over the reader's own error.
    pub(super) fn finish(mut self, outcome: GeozeroResult<()>) -> Result<Geometry, GeometryError> {
        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }
        if let Err(error) = outcome {
            return Err(map_error(self.format, &error));
        }
        let empty = |detail: &str| {
            Err(GeometryError::decode(
                self.format,
                GeometryErrorKind::EmptyCoordinates,
                detail,
            ))
        };
        match self.root {
            None => Err(GeometryError::decode(
                self.format,
                GeometryErrorKind::UnsupportedType,
                "no supported geometry found",
            )),
            Some(GeometryType::Point) => match self.coords.as_slice() {
                [] => empty("empty point"),
                [c] if c.x.is_nan() && c.y.is_nan() => empty("empty point (NaN coordinates)"),
                [c] => Ok(Geometry::Point(*c)),
                more => Err(GeometryError::decode(
                    self.format,
                    GeometryErrorKind::InvalidStructure,
                    format!("point has {} positions", more.len()),
                )),
            },
            Some(GeometryType::LineString) => Ok(Geometry::LineString(self.coords)),
            Some(GeometryType::Polygon) => Ok(Geometry::Polygon(self.lines)),
            Some(GeometryType::MultiPoint) => Ok(Geometry::MultiPoint(self.coords)),
            Some(GeometryType::MultiLineString) => Ok(Geometry::MultiLineString(self.lines)),
            Some(GeometryType::MultiPolygon) => Ok(Geometry::MultiPolygon(self.polygons)),
        }
    }
}

fn map_error(format: GeometryFormat, error: &GeozeroError) -> GeometryError {
    let kind = match (format, error) {
        (GeometryFormat::Wkb, GeozeroError::IoError(_)) => GeometryErrorKind::TruncatedWkb,
        (GeometryFormat::Wkt, _) => GeometryErrorKind::MalformedWkt,
        _ => GeometryErrorKind::InvalidStructure,
    };
    GeometryError::decode(format, kind, error.to_string())
}

impl GeomProcessor for GeometryBuilder {
    fn multi_dim(&self) -> bool {
        true
    }

    fn xy(&mut self, x: f64, y: f64, _idx: usize) -> GeozeroResult<()> {
        self.push(Coord::xy(x, y))
    }

    fn coordinate(
        &mut self,
        x: f64,
        y: f64,
        z: Option<f64>,
        m: Option<f64>,
        _t: Option<f64>,
        _tm: Option<u64>,
        _idx: usize,
    ) -> GeozeroResult<()> {
        if m.is_some() {
            return self.reject(
                GeometryErrorKind::UnsupportedType,
                "measured (M) coordinates are not supported",
            );
        }
        self.push(Coord { x, y, z })
    }

    fn empty_point(&mut self, _idx: usize) -> GeozeroResult<()> {
        self.reject(GeometryErrorKind::EmptyCoordinates, "POINT EMPTY is not supported")
    }

    fn point_begin(&mut self, _idx: usize) -> GeozeroResult<()> {
        self.begin(GeometryType::Point)
    }

    fn multipoint_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.begin(GeometryType::MultiPoint)
    }

    fn linestring_begin(&mut self, tagged: bool, _size: usize, _idx: usize) -> GeozeroResult<()> {
        if tagged {
            self.begin(GeometryType::LineString)
        } else {
            self.member("line member")
        }
    }

    fn linestring_end(&mut self, tagged: bool, _idx: usize) -> GeozeroResult<()> {
        if !tagged {
            self.lines.push(std::mem::take(&mut self.coords));
        }
        Ok(())
    }

    fn multilinestring_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.begin(GeometryType::MultiLineString)
    }

    fn polygon_begin(&mut self, tagged: bool, _size: usize, _idx: usize) -> GeozeroResult<()> {
        if tagged {
            self.begin(GeometryType::Polygon)
        } else {
            self.member("polygon member")
        }
    }

    fn polygon_end(&mut self, tagged: bool, _idx: usize) -> GeozeroResult<()> {
        if !tagged {
            self.polygons.push(std::mem::take(&mut self.lines));
        }
        Ok(())
    }

    fn multipolygon_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.begin(GeometryType::MultiPolygon)
    }

    fn geometrycollection_begin(&mut self, _size: usize, _idx: usize) -> GeozeroResult<()> {
        self.unsupported("GeometryCollection")
    }
}

impl GeozeroGeometry for Geometry {
    fn process_geom<P: GeomProcessor>(&self, processor: &mut P) -> GeozeroResult<()> {
        match self {
            Self::Point(c) => {
                processor.point_begin(0)?;
                emit_coord(processor, c, 0)?;
                processor.point_end(0)
            },
            Self::LineString(line) => emit_line(processor, line, true, 0),
            Self::Polygon(rings) => emit_polygon(processor, rings, true, 0),
            Self::MultiPoint(points) => {
                processor.multipoint_begin(points.len(), 0)?;
                for (idx, c) in points.iter().enumerate() {
                    emit_coord(processor, c, idx)?;
                }
                processor.multipoint_end(0)
            },
            Self::MultiLineString(lines) => {
                processor.multilinestring_begin(lines.len(), 0)?;
                for (idx, line) in lines.iter().enumerate() {
                    emit_line(processor, line, false, idx)?;
                }
                processor.multilinestring_end(0)
            },
            Self::MultiPolygon(polygons) => {
                processor.multipolygon_begin(polygons.len(), 0)?;
                for (idx, rings) in polygons.iter().enumerate() {
                    emit_polygon(processor, rings, false, idx)?;
                }
                processor.multipolygon_end(0)
            },
        }
    }

    fn dims(&self) -> CoordDimensions {
        dimensions(self)
    }
}

/// Coordinate dimensions written for `geometry`.
pub(super) fn dimensions(geometry: &Geometry) -> CoordDimensions {
    if geometry.has_z() {
        CoordDimensions::xyz()
    } else {
        CoordDimensions::xy()
    }
}

fn emit_coord<P: GeomProcessor>(processor: &mut P, c: &Coord, idx: usize) -> GeozeroResult<()> {
    if processor.multi_dim() {
        processor.coordinate(c.x, c.y, c.z, None, None, None, idx)
    } else {
        processor.xy(c.x, c.y, idx)
    }
}

fn emit_line<P: GeomProcessor>(
    processor: &mut P,
    line: &[Coord],
    tagged: bool,
    idx: usize,
) -> GeozeroResult<()> {
    processor.linestring_begin(tagged, line.len(), idx)?;
    for (i, c) in line.iter().enumerate() {
        emit_coord(processor, c, i)?;
    }
    processor.linestring_end(tagged, idx)
}

fn emit_polygon<P: GeomProcessor>(
    processor: &mut P,
    rings: &[Line],
    tagged: bool,
    idx: usize,
) -> GeozeroResult<()> {
    processor.polygon_begin(tagged, rings.len(), idx)?;
    for (i, ring) in rings.iter().enumerate() {
        emit_line(processor, ring, false, i)?;
    }
    processor.polygon_end(tagged, idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::samples;

    #[test]
    fn test_replay_rebuilds_every_sample() {
        for geometry in samples() {
            let mut builder = GeometryBuilder::new(GeometryFormat::Wkb);
            let outcome = geometry.process_geom(&mut builder);
            assert_eq!(builder.finish(outcome).unwrap(), geometry);
        }
    }

    #[test]
    fn test_rejection_wins_over_reader_error() {
        let mut builder = GeometryBuilder::new(GeometryFormat::Wkt);
        let outcome = builder.geometrycollection_begin(1, 0);
        let err = builder.finish(outcome).unwrap_err();
        assert_eq!(err.decode_kind(), Some(GeometryErrorKind::UnsupportedType));
    }

    #[test]
    fn test_measured_coordinate_rejected() {
        let mut builder = GeometryBuilder::new(GeometryFormat::Wkb);
        builder.point_begin(0).unwrap();
        let outcome = builder.coordinate(1.0, 2.0, None, Some(3.0), None, None, 0);
        let err = builder.finish(outcome).unwrap_err();
        assert_eq!(err.decode_kind(), Some(GeometryErrorKind::UnsupportedType));
    }

    #[test]
    fn test_reader_errors_map_by_format() {
        let eof = || GeozeroError::IoError(std::io::ErrorKind::UnexpectedEof.into());
        let err = GeometryBuilder::new(GeometryFormat::Wkb)
            .finish(Err(eof()))
            .unwrap_err();
        assert_eq!(err.decode_kind(), Some(GeometryErrorKind::TruncatedWkb));

        let err = GeometryBuilder::new(GeometryFormat::Wkt)
            .finish(Err(GeozeroError::Geometry("bad".to_string())))
            .unwrap_err();
        assert_eq!(err.decode_kind(), Some(GeometryErrorKind::MalformedWkt));
    }
}
