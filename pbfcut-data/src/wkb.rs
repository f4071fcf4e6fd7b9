//! Well-known binary (WKB) encoding for two-dimensional geometries.
//!
//! Encoding always produces little-endian output. Decoding accepts either
//! byte order, part by part, as the format allows.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use geo::{
    Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
use thiserror::Error;

const POINT: u32 = 1;
const LINE_STRING: u32 = 2;
const POLYGON: u32 = 3;
const MULTI_POINT: u32 = 4;
const MULTI_LINE_STRING: u32 = 5;
const MULTI_POLYGON: u32 = 6;

/// Errors raised while encoding or decoding WKB.
#[derive(Debug, Error)]
pub enum WkbError {
    /// Reading or writing the byte stream failed.
    #[error("WKB stream error")]
    Io(#[from] io::Error),
    /// The byte-order marker was neither 0 nor 1.
    #[error("invalid WKB byte order marker {0}")]
    ByteOrder(u8),
    /// The geometry type code is not a supported 2D type.
    #[error("unsupported WKB geometry type {0}")]
    UnsupportedType(u32),
    /// A geometry collection cannot be stored in a single-kind layer.
    #[error("geometry collections cannot be encoded")]
    Collection,
    /// A count field does not fit in 32 bits.
    #[error("too many parts to encode: {0}")]
    TooLarge(usize),
}

/// Encode `geometry` as little-endian WKB.
///
/// # Errors
/// Returns [`WkbError`] for geometry collections or on write failure.
pub fn write_wkb<W: Write>(writer: &mut W, geometry: &Geometry<f64>) -> Result<(), WkbError> {
    match geometry {
        Geometry::Point(point) => {
            header(writer, POINT)?;
            write_coord(writer, point.0)
        }
        Geometry::Line(line) => write_line_string(writer, &LineString::from(*line)),
        Geometry::LineString(line) => write_line_string(writer, line),
        Geometry::Polygon(polygon) => write_polygon(writer, polygon),
        Geometry::Rect(rect) => write_polygon(writer, &rect.to_polygon()),
        Geometry::Triangle(triangle) => write_polygon(writer, &triangle.to_polygon()),
        Geometry::MultiPoint(points) => {
            header(writer, MULTI_POINT)?;
            write_count(writer, points.0.len())?;
            for point in points {
                header(writer, POINT)?;
                write_coord(writer, point.0)?;
            }
            Ok(())
        }
        Geometry::MultiLineString(lines) => {
            header(writer, MULTI_LINE_STRING)?;
            write_count(writer, lines.0.len())?;
            lines
                .iter()
                .try_for_each(|line| write_line_string(writer, line))
        }
        Geometry::MultiPolygon(polygons) => {
            header(writer, MULTI_POLYGON)?;
            write_count(writer, polygons.0.len())?;
            polygons
                .iter()
                .try_for_each(|polygon| write_polygon(writer, polygon))
        }
        Geometry::GeometryCollection(_) => Err(WkbError::Collection),
    }
}

/// Encode `geometry` into a fresh buffer.
///
/// # Errors
/// See [`write_wkb`].
pub fn to_wkb(geometry: &Geometry<f64>) -> Result<Vec<u8>, WkbError> {
    let mut buffer = Vec::new();
    write_wkb(&mut buffer, geometry)?;
    Ok(buffer)
}

fn header<W: Write>(writer: &mut W, kind: u32) -> Result<(), WkbError> {
    writer.write_u8(1)?;
    writer.write_u32::<LittleEndian>(kind)?;
    Ok(())
}

fn write_count<W: Write>(writer: &mut W, count: usize) -> Result<(), WkbError> {
    let count = u32::try_from(count).map_err(|_| WkbError::TooLarge(count))?;
    writer.write_u32::<LittleEndian>(count)?;
    Ok(())
}

fn write_coord<W: Write>(writer: &mut W, coord: Coord<f64>) -> Result<(), WkbError> {
    writer.write_f64::<LittleEndian>(coord.x)?;
    writer.write_f64::<LittleEndian>(coord.y)?;
    Ok(())
}

fn write_ring<W: Write>(writer: &mut W, ring: &LineString<f64>) -> Result<(), WkbError> {
    write_count(writer, ring.0.len())?;
    ring.0
        .iter()
        .try_for_each(|coord| write_coord(writer, *coord))
}

fn write_line_string<W: Write>(writer: &mut W, line: &LineString<f64>) -> Result<(), WkbError> {
    header(writer, LINE_STRING)?;
    write_ring(writer, line)
}

fn write_polygon<W: Write>(writer: &mut W, polygon: &Polygon<f64>) -> Result<(), WkbError> {
    header(writer, POLYGON)?;
    write_count(writer, 1 + polygon.interiors().len())?;
    write_ring(writer, polygon.exterior())?;
    polygon
        .interiors()
        .iter()
        .try_for_each(|ring| write_ring(writer, ring))
}

/// Decode one WKB geometry from `reader`.
///
/// # Errors
/// Returns [`WkbError`] on truncated input or unsupported type codes.
pub fn read_wkb<R: Read>(reader: &mut R) -> Result<Geometry<f64>, WkbError> {
    match reader.read_u8()? {
        0 => read_body::<BigEndian, R>(reader),
        1 => read_body::<LittleEndian, R>(reader),
        other => Err(WkbError::ByteOrder(other)),
    }
}

fn read_body<B: ByteOrder, R: Read>(reader: &mut R) -> Result<Geometry<f64>, WkbError> {
    let kind = reader.read_u32::<B>()?;
    let geometry = match kind {
        POINT => Geometry::Point(Point(read_coord::<B, R>(reader)?)),
        LINE_STRING => Geometry::LineString(read_ring::<B, R>(reader)?),
        POLYGON => Geometry::Polygon(read_polygon::<B, R>(reader)?),
        MULTI_POINT => {
            let count = read_count::<B, R>(reader)?;
            let points = read_parts(reader, count, |geometry| match geometry {
                Geometry::Point(point) => Some(point),
                _ => None,
            })?;
            Geometry::MultiPoint(MultiPoint(points))
        }
        MULTI_LINE_STRING => {
            let count = read_count::<B, R>(reader)?;
            let lines = read_parts(reader, count, |geometry| match geometry {
                Geometry::LineString(line) => Some(line),
                _ => None,
            })?;
            Geometry::MultiLineString(MultiLineString(lines))
        }
        MULTI_POLYGON => {
            let count = read_count::<B, R>(reader)?;
            let polygons = read_parts(reader, count, |geometry| match geometry {
                Geometry::Polygon(polygon) => Some(polygon),
                _ => None,
            })?;
            Geometry::MultiPolygon(MultiPolygon(polygons))
        }
        other => return Err(WkbError::UnsupportedType(other)),
    };
    Ok(geometry)
}

fn read_parts<R, T, F>(reader: &mut R, count: usize, select: F) -> Result<Vec<T>, WkbError>
where
    R: Read,
    F: Fn(Geometry<f64>) -> Option<T>,
{
    let mut parts = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let part = read_wkb(reader)?;
        let code = type_code(&part);
        parts.push(select(part).ok_or(WkbError::UnsupportedType(code))?);
    }
    Ok(parts)
}

const fn type_code(geometry: &Geometry<f64>) -> u32 {
    match geometry {
        Geometry::Point(_) => POINT,
        Geometry::Line(_) | Geometry::LineString(_) => LINE_STRING,
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => POLYGON,
        Geometry::MultiPoint(_) => MULTI_POINT,
        Geometry::MultiLineString(_) => MULTI_LINE_STRING,
        Geometry::MultiPolygon(_) => MULTI_POLYGON,
        Geometry::GeometryCollection(_) => 7,
    }
}

fn read_count<B: ByteOrder, R: Read>(reader: &mut R) -> Result<usize, WkbError> {
    let count = reader.read_u32::<B>()?;
    usize::try_from(count).map_err(|_| WkbError::UnsupportedType(count))
}

fn read_coord<B: ByteOrder, R: Read>(reader: &mut R) -> Result<Coord<f64>, WkbError> {
    let x = reader.read_f64::<B>()?;
    let y = reader.read_f64::<B>()?;
    Ok(Coord { x, y })
}

fn read_ring<B: ByteOrder, R: Read>(reader: &mut R) -> Result<LineString<f64>, WkbError> {
    let count = read_count::<B, R>(reader)?;
    let mut coords = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        coords.push(read_coord::<B, R>(reader)?);
    }
    Ok(LineString(coords))
}

fn read_polygon<B: ByteOrder, R: Read>(reader: &mut R) -> Result<Polygon<f64>, WkbError> {
    let count = read_count::<B, R>(reader)?;
    if count == 0 {
        return Ok(Polygon::new(LineString(Vec::new()), Vec::new()));
    }
    let exterior = read_ring::<B, R>(reader)?;
    let mut interiors = Vec::with_capacity(count - 1);
    for _ in 1..count {
        interiors.push(read_ring::<B, R>(reader)?);
    }
    Ok(Polygon::new(exterior, interiors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon};
    use rstest::rstest;

    #[test]
    fn points_encode_to_twenty_one_bytes() {
        let bytes = to_wkb(&Geometry::Point(point!(x: 1.0, y: 2.0))).expect("encode");
        assert_eq!(bytes.len(), 21);
        assert_eq!(bytes.first(), Some(&1));
        assert_eq!(bytes.get(1..5), Some(&[1, 0, 0, 0][..]));
    }

    #[rstest]
    #[case(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]))]
    #[case(Geometry::Polygon(polygon![
        exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 0.0)],
        interiors: [[(x: 1.0, y: 1.0), (x: 2.0, y: 1.0), (x: 2.0, y: 2.0), (x: 1.0, y: 1.0)]],
    ]))]
    #[case(Geometry::MultiPoint(MultiPoint(vec![point!(x: 1.0, y: 1.0), point!(x: 2.0, y: 3.0)])))]
    #[case(Geometry::MultiLineString(MultiLineString(vec![
        line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
        line_string![(x: 2.0, y: 2.0), (x: 3.0, y: 1.0), (x: 4.0, y: 2.0)],
    ])))]
    #[case(Geometry::MultiPolygon(MultiPolygon(vec![
        polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)],
        polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0), (x: 5.0, y: 5.0)],
    ])))]
    fn decoding_restores_the_geometry(#[case] geometry: Geometry<f64>) {
        let bytes = to_wkb(&geometry).expect("encode");
        let decoded = read_wkb(&mut bytes.as_slice()).expect("decode");
        assert_eq!(decoded, geometry);
    }

    #[test]
    fn big_endian_points_are_read() {
        let mut bytes = vec![0_u8, 0, 0, 0, 1];
        bytes.extend_from_slice(&3.5_f64.to_be_bytes());
        bytes.extend_from_slice(&(-1.0_f64).to_be_bytes());
        let decoded = read_wkb(&mut bytes.as_slice()).expect("decode");
        assert_eq!(decoded, Geometry::Point(point!(x: 3.5, y: -1.0)));
    }

    #[test]
    fn collections_are_refused() {
        let collection = Geometry::GeometryCollection(geo::GeometryCollection(Vec::new()));
        assert!(matches!(to_wkb(&collection), Err(WkbError::Collection)));
    }

    #[test]
    fn three_dimensional_codes_are_rejected() {
        let bytes = [1_u8, 0xE9, 0x03, 0, 0];
        assert!(matches!(
            read_wkb(&mut bytes.as_slice()),
            Err(WkbError::UnsupportedType(1001))
        ));
    }

    #[test]
    fn truncated_input_is_an_error() {
        let bytes = [1_u8, 1, 0, 0, 0, 0];
        assert!(matches!(read_wkb(&mut bytes.as_slice()), Err(WkbError::Io(_))));
    }
}
