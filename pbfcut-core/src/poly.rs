//! Polygon filter documents as read by `osmconvert -B=`.
//!
//! A document starts with a label line and ends with `END`. Each ring in
//! between opens with its numeric id (prefixed with `!` for holes), lists one
//! tab-indented `x y` pair per line and closes with its own `END`. Ring ids
//! come from a single [`RingCounter`] per document, so ids keep counting
//! across polygon parts and across source geometries.
//!
//! # Examples
//! ```
//! use geo::{Geometry, polygon};
//! use pbfcut_core::poly::to_poly_string;
//!
//! let square = polygon![(x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0)];
//! let text = to_poly_string("square", &[Geometry::Polygon(square)])?;
//! assert!(text.starts_with("square\n0\n\t0.0000000E+00\t0.0000000E+00\n"));
//! assert!(text.ends_with("END\nEND\n"));
//! # Ok::<(), pbfcut_core::poly::PolyError>(())
//! ```

use std::io::{self, Write};
use std::str::FromStr;

use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use thiserror::Error;

use crate::boundary::geometry_name;

/// Errors raised while writing a polygon filter document.
#[derive(Debug, Error)]
pub enum PolyError {
    /// The geometry is not a polygon or multipolygon.
    #[error("cannot write a {found} into a polygon filter")]
    UnsupportedGeometry {
        /// Name of the rejected geometry type.
        found: &'static str,
    },
    /// A coordinate was NaN or infinite.
    #[error("ring {ring} holds a non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate {
        /// Id of the ring being written.
        ring: u64,
        /// Longitude as found.
        x: f64,
        /// Latitude as found.
        y: f64,
    },
    /// The underlying writer failed.
    #[error("failed to write polygon filter")]
    Io(#[from] io::Error),
}

/// Issues ring ids for one document.
///
/// Exterior and interior rings share the sequence; callers thread the same
/// counter through every geometry they write into a document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RingCounter {
    next: u64,
}

impl RingCounter {
    /// A counter that starts at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Take the next id.
    pub const fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// How many ids have been issued.
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.next
    }
}

/// Write a complete document holding every geometry under one label.
///
/// # Errors
/// Returns [`PolyError`] for non-polygonal geometries, non-finite
/// coordinates, or writer failures.
pub fn write_poly<W: Write>(
    writer: &mut W,
    label: &str,
    geometries: &[Geometry<f64>],
) -> Result<(), PolyError> {
    writeln!(writer, "{label}")?;
    let mut counter = RingCounter::new();
    for geometry in geometries {
        write_geometry(writer, geometry, &mut counter)?;
    }
    writeln!(writer, "END")?;
    Ok(())
}

/// Render a complete document to a string.
///
/// # Errors
/// See [`write_poly`].
pub fn to_poly_string(label: &str, geometries: &[Geometry<f64>]) -> Result<String, PolyError> {
    let mut buffer = Vec::new();
    write_poly(&mut buffer, label, geometries)?;
    String::from_utf8(buffer).map_err(|err| PolyError::Io(io::Error::other(err)))
}

/// Write the rings of one geometry, taking ids from `counter`.
///
/// # Errors
/// Returns [`PolyError::UnsupportedGeometry`] for anything other than
/// polygons, multipolygons, rectangles and triangles.
pub fn write_geometry<W: Write>(
    writer: &mut W,
    geometry: &Geometry<f64>,
    counter: &mut RingCounter,
) -> Result<(), PolyError> {
    match geometry {
        Geometry::Polygon(polygon) => write_polygon(writer, polygon, counter),
        Geometry::MultiPolygon(multi) => multi
            .iter()
            .try_for_each(|polygon| write_polygon(writer, polygon, counter)),
        Geometry::Rect(rect) => write_polygon(writer, &rect.to_polygon(), counter),
        Geometry::Triangle(triangle) => write_polygon(writer, &triangle.to_polygon(), counter),
        other => Err(PolyError::UnsupportedGeometry {
            found: geometry_name(other),
        }),
    }
}

fn write_polygon<W: Write>(
    writer: &mut W,
    polygon: &Polygon<f64>,
    counter: &mut RingCounter,
) -> Result<(), PolyError> {
    let id = counter.next_id();
    writeln!(writer, "{id}")?;
    write_ring(writer, polygon.exterior(), id)?;
    for hole in polygon.interiors() {
        let hole_id = counter.next_id();
        writeln!(writer, "!{hole_id}")?;
        write_ring(writer, hole, hole_id)?;
    }
    Ok(())
}

fn write_ring<W: Write>(writer: &mut W, ring: &LineString<f64>, id: u64) -> Result<(), PolyError> {
    let coords = ring.0.as_slice();
    let open = match (coords.first(), coords.split_last()) {
        (Some(first), Some((last, rest))) if first == last && !rest.is_empty() => rest,
        _ => coords,
    };
    for coord in open {
        if !(coord.x.is_finite() && coord.y.is_finite()) {
            return Err(PolyError::NonFiniteCoordinate {
                ring: id,
                x: coord.x,
                y: coord.y,
            });
        }
        writeln!(
            writer,
            "\t{}\t{}",
            format_coordinate(coord.x),
            format_coordinate(coord.y)
        )?;
    }
    writeln!(writer, "END")?;
    Ok(())
}

/// Scientific notation with seven fractional digits and a signed, two digit
/// exponent (`1.4275000E+00`).
#[must_use]
pub fn format_coordinate(value: f64) -> String {
    let raw = format!("{value:.7E}");
    let Some((mantissa, exponent)) = raw.split_once('E') else {
        return raw;
    };
    let (sign, digits) = exponent
        .strip_prefix('-')
        .map_or(('+', exponent), |rest| ('-', rest));
    format!("{mantissa}E{sign}{digits:0>2}")
}

/// Errors raised while parsing a polygon filter document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolyParseError {
    /// The document has no label line.
    #[error("polygon filter is empty")]
    MissingLabel,
    /// The input ended inside a ring or before the closing `END`.
    #[error("polygon filter ends before its closing END")]
    UnexpectedEof,
    /// A coordinate line could not be read.
    #[error("line {line}: expected two numbers, found '{text}'")]
    InvalidCoordinate {
        /// One-based line number.
        line: usize,
        /// The offending text.
        text: String,
    },
    /// A hole appeared before any exterior ring.
    #[error("line {line}: hole '{name}' has no preceding exterior ring")]
    OrphanHole {
        /// One-based line number.
        line: usize,
        /// Ring name as written.
        name: String,
    },
}

/// One ring read back from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyRing {
    /// The ring name without any `!` prefix.
    pub name: String,
    /// Whether the ring was marked as a hole.
    pub hole: bool,
    /// One-based line number of the ring header.
    pub line: usize,
    /// Vertices in file order.
    pub coords: Vec<Coord<f64>>,
}

/// A parsed polygon filter document.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyDocument {
    /// The label line.
    pub label: String,
    /// Rings in file order.
    pub rings: Vec<PolyRing>,
}

impl PolyDocument {
    /// Rebuild polygons, attaching each hole to the preceding exterior.
    ///
    /// # Errors
    /// Returns [`PolyParseError::OrphanHole`] when a hole comes first.
    pub fn to_multi_polygon(&self) -> Result<MultiPolygon<f64>, PolyParseError> {
        let mut parts: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
        for ring in &self.rings {
            let line = LineString::from(ring.coords.clone());
            if ring.hole {
                let Some((_, holes)) = parts.last_mut() else {
                    return Err(PolyParseError::OrphanHole {
                        line: ring.line,
                        name: ring.name.clone(),
                    });
                };
                holes.push(line);
            } else {
                parts.push((line, Vec::new()));
            }
        }
        Ok(MultiPolygon(
            parts
                .into_iter()
                .map(|(exterior, holes)| Polygon::new(exterior, holes))
                .collect(),
        ))
    }
}

impl FromStr for PolyDocument {
    type Err = PolyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s
            .lines()
            .enumerate()
            .map(|(index, text)| (index + 1, text.trim()))
            .filter(|(_, text)| !text.is_empty());
        let (_, label) = lines.next().ok_or(PolyParseError::MissingLabel)?;
        let mut rings = Vec::new();
        loop {
            let (line, header) = lines.next().ok_or(PolyParseError::UnexpectedEof)?;
            if header == "END" {
                break;
            }
            let (name, hole) = header
                .strip_prefix('!')
                .map_or((header, false), |rest| (rest, true));
            if hole && rings.is_empty() {
                return Err(PolyParseError::OrphanHole {
                    line,
                    name: name.to_owned(),
                });
            }
            let mut coords = Vec::new();
            loop {
                let (coord_line, text) = lines.next().ok_or(PolyParseError::UnexpectedEof)?;
                if text == "END" {
                    break;
                }
                coords.push(parse_coordinate(coord_line, text)?);
            }
            rings.push(PolyRing {
                name: name.to_owned(),
                hole,
                line,
                coords,
            });
        }
        Ok(Self {
            label: label.to_owned(),
            rings,
        })
    }
}

fn parse_coordinate(line: usize, text: &str) -> Result<Coord<f64>, PolyParseError> {
    let invalid = || PolyParseError::InvalidCoordinate {
        line,
        text: text.to_owned(),
    };
    let mut parts = text.split_whitespace();
    let x = parts.next().and_then(|v| v.parse::<f64>().ok());
    let y = parts.next().and_then(|v| v.parse::<f64>().ok());
    match (x, y, parts.next()) {
        (Some(x), Some(y), None) => Ok(Coord { x, y }),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, MultiPolygon, Point, polygon};
    use rstest::{fixture, rstest};

    #[fixture]
    fn square() -> Polygon<f64> {
        polygon![(x: 0.0, y: 0.0), (x: 0.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0)]
    }

    fn ring(points: &[(f64, f64)]) -> LineString<f64> {
        LineString::from(points.to_vec())
    }

    fn headers(text: &str) -> Vec<&str> {
        text.lines()
            .skip(1)
            .filter(|line| !line.starts_with('\t') && *line != "END")
            .collect()
    }

    #[rstest]
    #[case(1.4275, "1.4275000E+00")]
    #[case(-0.75, "-7.5000000E-01")]
    #[case(0.0, "0.0000000E+00")]
    #[case(123_456.0, "1.2345600E+05")]
    #[case(1.0e-12, "1.0000000E-12")]
    #[case(-179.5, "-1.7950000E+02")]
    fn coordinates_use_signed_two_digit_exponents(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(format_coordinate(value), expected);
    }

    #[rstest]
    fn polygon_without_holes_has_one_ring(square: Polygon<f64>) {
        let text = to_poly_string("area", &[Geometry::Polygon(square)]).expect("polygon");
        assert_eq!(headers(&text), vec!["0"]);
        assert_eq!(text.lines().filter(|line| *line == "END").count(), 2);
        assert_eq!(text.lines().filter(|line| line.starts_with('\t')).count(), 4);
    }

    #[test]
    fn holes_continue_the_ring_sequence() {
        let polygon = Polygon::new(
            ring(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]),
            vec![
                ring(&[(1.0, 1.0), (1.0, 2.0), (2.0, 2.0)]),
                ring(&[(5.0, 5.0), (5.0, 6.0), (6.0, 6.0)]),
            ],
        );
        let text = to_poly_string("holes", &[Geometry::Polygon(polygon)]).expect("polygon");
        assert_eq!(headers(&text), vec!["0", "!1", "!2"]);
    }

    #[rstest]
    fn multipolygon_parts_share_the_counter(square: Polygon<f64>) {
        let holed = Polygon::new(
            ring(&[(5.0, 5.0), (5.0, 9.0), (9.0, 9.0), (9.0, 5.0)]),
            vec![ring(&[(6.0, 6.0), (6.0, 7.0), (7.0, 7.0)])],
        );
        let multi = MultiPolygon(vec![holed, square]);
        let text = to_poly_string("parts", &[Geometry::MultiPolygon(multi)]).expect("polygon");
        assert_eq!(headers(&text), vec!["0", "!1", "2"]);
    }

    #[rstest]
    fn separate_geometries_share_the_counter(square: Polygon<f64>) {
        let geometries = [
            Geometry::Polygon(square.clone()),
            Geometry::Polygon(square),
        ];
        let mut counter = RingCounter::new();
        let mut sink = Vec::new();
        for geometry in &geometries {
            write_geometry(&mut sink, geometry, &mut counter).expect("polygon");
        }
        assert_eq!(counter.issued(), 2);
        let text = String::from_utf8(sink).expect("utf8");
        assert_eq!(text.lines().next(), Some("0"));
        assert!(text.contains("END\n1\n"));
    }

    #[test]
    fn rejects_non_polygonal_geometry() {
        let err = to_poly_string("bad", &[Geometry::Point(Point::new(0.0, 0.0))]).unwrap_err();
        assert!(matches!(err, PolyError::UnsupportedGeometry { found: "Point" }));
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let polygon = Polygon::new(ring(&[(0.0, 0.0), (f64::NAN, 1.0), (1.0, 1.0)]), Vec::new());
        let err = to_poly_string("nan", &[Geometry::Polygon(polygon)]).unwrap_err();
        assert!(matches!(err, PolyError::NonFiniteCoordinate { ring: 0, .. }));
    }

    #[rstest]
    fn rectangle_survives_a_round_trip(square: Polygon<f64>) {
        let text = to_poly_string("square", &[Geometry::Polygon(square)]).expect("polygon");
        let document: PolyDocument = text.parse().expect("parse");
        assert_eq!(document.label, "square");
        assert_eq!(document.rings.len(), 1);
        let exterior = document.rings.first().expect("exterior ring");
        assert!(!exterior.hole);
        assert_eq!(exterior.coords.len(), 4);
        let rebuilt = document.to_multi_polygon().expect("polygons");
        assert_eq!(rebuilt.0.len(), 1);
        assert!(rebuilt.0.iter().all(|p| p.interiors().is_empty()));
    }

    #[test]
    fn parser_attaches_holes_to_previous_exterior() {
        let text = "area\n1\n\t0 0\n\t0 4\n\t4 4\n\t4 0\nEND\n!2\n\t1 1\n\t1 2\n\t2 2\nEND\nEND\n";
        let document: PolyDocument = text.parse().expect("parse");
        let multi = document.to_multi_polygon().expect("polygons");
        let polygon = multi.0.first().expect("polygon");
        assert_eq!(polygon.interiors().len(), 1);
    }

    #[test]
    fn rebuilding_reports_the_header_line_of_a_leading_hole() {
        let document = PolyDocument {
            label: "area".into(),
            rings: vec![PolyRing {
                name: "3".into(),
                hole: true,
                line: 7,
                coords: vec![Coord { x: 1.0, y: 1.0 }, Coord { x: 1.0, y: 2.0 }],
            }],
        };
        assert_eq!(
            document.to_multi_polygon(),
            Err(PolyParseError::OrphanHole { line: 7, name: "3".into() })
        );
    }

    #[test]
    fn parsed_rings_remember_their_header_lines() {
        let text = "area\n1\n\t0 0\n\t0 4\n\t4 4\nEND\n\n!2\n\t1 1\n\t1 2\n\t2 2\nEND\nEND\n";
        let document: PolyDocument = text.parse().expect("parse");
        let lines: Vec<_> = document.rings.iter().map(|ring| ring.line).collect();
        assert_eq!(lines, vec![2, 8]);
    }

    #[rstest]
    #[case("", PolyParseError::MissingLabel)]
    #[case("area\n0\n\t0 0\n", PolyParseError::UnexpectedEof)]
    #[case(
        "area\n0\n\t0 north\nEND\nEND\n",
        PolyParseError::InvalidCoordinate { line: 3, text: "0 north".into() }
    )]
    #[case(
        "area\n!0\n\t0 0\nEND\nEND\n",
        PolyParseError::OrphanHole { line: 2, name: "0".into() }
    )]
    fn parser_reports_malformed_documents(#[case] text: &str, #[case] expected: PolyParseError) {
        assert_eq!(text.parse::<PolyDocument>(), Err(expected));
    }
}
