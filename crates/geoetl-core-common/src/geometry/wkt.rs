//! WKT reading and writing through geozero.

use geozero::wkt::Wkt;
use geozero::{GeozeroGeometry, ToWkt};

use super::processor::{GeometryBuilder, dimensions};
use super::{Geometry, GeometryFormat};
use crate::error::{GeometryError, GeometryErrorKind};

fn malformed(text: &str, detail: &str) -> GeometryError {
    let snippet: String = text.chars().take(80).collect();
    GeometryError::decode(
        GeometryFormat::Wkt,
        GeometryErrorKind::MalformedWkt,
        format!("{detail} in '{snippet}'"),
    )
}

/// Rejects unbalanced parentheses and anything after the closing one.
fn check_balanced(text: &str) -> Result<(), GeometryError> {
    let mut depth = 0usize;
    for (offset, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed(text, &format!("unexpected ')' at offset {offset}")))?;
                if depth == 0 && !text[offset + 1..].trim().is_empty() {
                    return Err(malformed(
                        text,
                        &format!("unexpected trailing characters at offset {}", offset + 1),
                    ));
                }
            },
            _ => {},
        }
    }
    if depth > 0 {
        return Err(malformed(text, "unclosed '('"));
    }
    Ok(())
}

pub(super) fn parse(text: &str) -> Result<Geometry, GeometryError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(malformed(text, "expected a geometry type"));
    }
    check_balanced(text)?;
    let mut builder = GeometryBuilder::new(GeometryFormat::Wkt);
    let outcome = Wkt(text).process_geom(&mut builder);
    builder.finish(outcome).map_err(|e| match e {
        GeometryError::Decode {
            kind: GeometryErrorKind::MalformedWkt,
            detail,
            ..
        } => malformed(text, &detail),
        other => other,
    })
}

pub(super) fn write(geometry: &Geometry) -> Result<String, GeometryError> {
    ToWkt::to_wkt_ndim(geometry, dimensions(geometry))
        .map_err(|e| GeometryError::encode(GeometryFormat::Wkt, e.to_string()))
}
