//! Structural mapping between `GeoJSON` geometry objects and [`Geometry`].

use geojson::{PointType, Value};

use super::{Coord, Geometry, GeometryFormat, GeometryType, Line, Rings};
use crate::error::{GeometryError, GeometryErrorKind};

fn error(kind: GeometryErrorKind, detail: impl Into<String>) -> GeometryError {
    GeometryError::decode(GeometryFormat::GeoJson, kind, detail)
}

pub(super) fn from_json_value(value: serde_json::Value) -> Result<Geometry, GeometryError> {
    let type_name = match value.get("type") {
        Some(serde_json::Value::String(name)) => name.clone(),
        Some(other) => {
            return Err(error(
                GeometryErrorKind::InvalidStructure,
                format!("geometry 'type' must be a string, found {other}"),
            ));
        },
        None => {
            return Err(error(
                GeometryErrorKind::InvalidStructure,
                "geometry object has no 'type' member",
            ));
        },
    };
    // exact names only; GeometryCollection and anything else is rejected
    if !GeometryType::ALL.iter().any(|t| t.as_str() == type_name) {
        return Err(error(
            GeometryErrorKind::UnsupportedType,
            format!("unsupported geometry type '{type_name}'"),
        ));
    }
    let geometry = geojson::Geometry::from_json_value(value)
        .map_err(|e| error(GeometryErrorKind::InvalidStructure, e.to_string()))?;
    from_geojson(&geometry)
}

pub(super) fn from_geojson(geometry: &geojson::Geometry) -> Result<Geometry, GeometryError> {
    Ok(match &geometry.value {
        Value::Point(position) => Geometry::Point(coord(position)?),
        Value::LineString(line) => Geometry::LineString(coords(line)?),
        Value::Polygon(rings) => Geometry::Polygon(rings_of(rings)?),
        Value::MultiPoint(points) => Geometry::MultiPoint(coords(points)?),
        Value::MultiLineString(lines) => Geometry::MultiLineString(rings_of(lines)?),
        Value::MultiPolygon(polygons) => Geometry::MultiPolygon(
            polygons
                .iter()
                .map(|rings| rings_of(rings))
                .collect::<Result<_, _>>()?,
        ),
        Value::GeometryCollection(_) => {
            return Err(error(
                GeometryErrorKind::UnsupportedType,
                "unsupported geometry type 'GeometryCollection'",
            ));
        },
    })
}

fn coord(position: &PointType) -> Result<Coord, GeometryError> {
    match position.as_slice() {
        [x, y] => Ok(Coord::xy(*x, *y)),
        [x, y, z] => Ok(Coord::xyz(*x, *y, *z)),
        [] => Err(error(GeometryErrorKind::EmptyCoordinates, "empty position")),
        other => Err(error(
            GeometryErrorKind::InvalidStructure,
            format!("position has {} element(s), expected 2 or 3", other.len()),
        )),
    }
}

fn coords(positions: &[PointType]) -> Result<Line, GeometryError> {
    positions.iter().map(coord).collect()
}

fn rings_of(rings: &[Vec<PointType>]) -> Result<Rings, GeometryError> {
    rings.iter().map(|ring| coords(ring)).collect()
}

pub(super) fn to_geojson(geometry: &Geometry) -> geojson::Geometry {
    let value = match geometry {
        Geometry::Point(c) => Value::Point(position(c)),
        Geometry::LineString(line) => Value::LineString(positions(line)),
        Geometry::Polygon(rings) => Value::Polygon(rings.iter().map(|r| positions(r)).collect()),
        Geometry::MultiPoint(points) => Value::MultiPoint(positions(points)),
        Geometry::MultiLineString(lines) => {
            Value::MultiLineString(lines.iter().map(|l| positions(l)).collect())
        },
        Geometry::MultiPolygon(polygons) => Value::MultiPolygon(
            polygons
                .iter()
                .map(|rings| rings.iter().map(|r| positions(r)).collect())
                .collect(),
        ),
    };
    geojson::Geometry::new(value)
}

fn position(c: &Coord) -> PointType {
    match c.z {
        Some(z) => vec![c.x, c.y, z],
        None => vec![c.x, c.y],
    }
}

fn positions(line: &[Coord]) -> Vec<PointType> {
    line.iter().map(position).collect()
}
