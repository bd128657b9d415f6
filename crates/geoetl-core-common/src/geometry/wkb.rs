//! ISO / extended WKB reading and little-endian ISO WKB writing through geozero.

use geozero::wkb::{Ewkb, Wkb};
use geozero::{GeozeroGeometry, ToWkb};

use super::processor::{GeometryBuilder, dimensions};
use super::{Geometry, GeometryFormat, GeometryType, Line};
use crate::error::{GeometryError, GeometryErrorKind};

const EWKB_Z_FLAG: u32 = 0x8000_0000;
const EWKB_M_FLAG: u32 = 0x4000_0000;
const EWKB_SRID_FLAG: u32 = 0x2000_0000;

fn error(kind: GeometryErrorKind, detail: impl Into<String>) -> GeometryError {
    GeometryError::decode(GeometryFormat::Wkb, kind, detail)
}

/// What the outermost header declares.
struct Header {
    extended: bool,
    has_z: bool,
    srid: bool,
}

fn header(bytes: &[u8]) -> Result<Header, GeometryError> {
    let [order, a, b, c, d, ..] = *bytes else {
        return Err(error(
            GeometryErrorKind::TruncatedWkb,
            format!("needed 5 header byte(s), {} present", bytes.len()),
        ));
    };
    let raw = match order {
        0 => u32::from_be_bytes([a, b, c, d]),
        1 => u32::from_le_bytes([a, b, c, d]),
        other => {
            return Err(error(
                GeometryErrorKind::InvalidStructure,
                format!("invalid byte order marker {other} at offset 0"),
            ));
        },
    };
    let unsupported = |detail: String| Err(error(GeometryErrorKind::UnsupportedType, detail));
    if raw & EWKB_M_FLAG != 0 {
        return unsupported(format!("measured geometry type code {raw:#x}"));
    }
    let code = raw & 0x0fff_ffff;
    let base = match code / 1000 {
        0 | 1 => code % 1000,
        _ => return unsupported(format!("geometry type code {code}")),
    };
    if GeometryType::from_wkb_code(base).is_none() {
        return unsupported(format!("geometry type code {code}"));
    }
    Ok(Header {
        extended: raw & (EWKB_Z_FLAG | EWKB_SRID_FLAG) != 0,
        has_z: raw & EWKB_Z_FLAG != 0 || code / 1000 == 1,
        srid: raw & EWKB_SRID_FLAG != 0,
    })
}

/// Size of `geometry` written with the dimension of its outer header.
fn encoded_len(geometry: &Geometry, has_z: bool) -> usize {
    let coord = if has_z { 24 } else { 16 };
    let line = |n: usize| 4 + n * coord;
    let rings = |rings: &[Line]| 4 + rings.iter().map(|r| line(r.len())).sum::<usize>();
    5 + match geometry {
        Geometry::Point(_) => coord,
        Geometry::LineString(points) => line(points.len()),
        Geometry::Polygon(polygon) => rings(polygon),
        Geometry::MultiPoint(points) => 4 + points.len() * (5 + coord),
        Geometry::MultiLineString(lines) => {
            4 + lines.iter().map(|l| 5 + line(l.len())).sum::<usize>()
        },
        Geometry::MultiPolygon(polygons) => {
            4 + polygons.iter().map(|p| 5 + rings(p)).sum::<usize>()
        },
    }
}

pub(super) fn read(bytes: &[u8]) -> Result<Geometry, GeometryError> {
    let header = header(bytes)?;
    let mut builder = GeometryBuilder::new(GeometryFormat::Wkb);
    let outcome = if header.extended {
        Ewkb(bytes).process_geom(&mut builder)
    } else {
        Wkb(bytes).process_geom(&mut builder)
    };
    let geometry = builder.finish(outcome)?;

    if geometry.coords().any(|c| c.z.is_some() != header.has_z) {
        return Err(error(
            GeometryErrorKind::InconsistentDimensions,
            "member dimension differs from the parent geometry",
        ));
    }
    let consumed = encoded_len(&geometry, header.has_z) + if header.srid { 4 } else { 0 };
    if bytes.len() > consumed {
        return Err(error(
            GeometryErrorKind::InvalidStructure,
            format!("{} trailing byte(s) after geometry", bytes.len() - consumed),
        ));
    }
    Ok(geometry)
}

pub(super) fn write(geometry: &Geometry) -> Result<Vec<u8>, GeometryError> {
    ToWkb::to_wkb(geometry, dimensions(geometry))
        .map_err(|e| GeometryError::encode(GeometryFormat::Wkb, e.to_string()))
}
