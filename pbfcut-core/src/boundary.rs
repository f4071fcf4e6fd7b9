//! Clip boundaries and the options they are resolved from.
//!
//! A [`Boundary`] is always a multipolygon: either the union of the polygons
//! read from a vector file or the rectangle described by a [`BoundingBox`].

use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use geo::{BoundingRect, Coord, Geometry, LineString, MultiPolygon, Polygon, Rect, unary_union};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a [`Boundary`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    /// No polygon was supplied.
    #[error("boundary must contain at least one polygon")]
    Empty,
    /// A supplied geometry was not polygonal.
    #[error("boundary geometries must be polygons, found {found}")]
    NotPolygonal {
        /// Name of the rejected geometry type.
        found: &'static str,
    },
}

/// The read-only clip area shared by every theme task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    area: MultiPolygon<f64>,
}

impl Boundary {
    /// Union polygonal geometries into one boundary.
    ///
    /// # Errors
    /// Returns [`BoundaryError::Empty`] when nothing polygonal remains and
    /// [`BoundaryError::NotPolygonal`] for points, lines and collections.
    ///
    /// # Examples
    /// ```
    /// use geo::{Geometry, Rect, coord};
    /// use pbfcut_core::Boundary;
    ///
    /// let left = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 2.0 });
    /// let right = Rect::new(coord! { x: 1.0, y: 0.0 }, coord! { x: 3.0, y: 2.0 });
    /// let boundary = Boundary::from_geometries([Geometry::Rect(left), Geometry::Rect(right)])?;
    /// assert_eq!(boundary.area().0.len(), 1);
    /// # Ok::<(), pbfcut_core::BoundaryError>(())
    /// ```
    pub fn from_geometries<I>(geometries: I) -> Result<Self, BoundaryError>
    where
        I: IntoIterator<Item = Geometry<f64>>,
    {
        let mut polygons = Vec::new();
        for geometry in geometries {
            match geometry {
                Geometry::Polygon(polygon) => polygons.push(polygon),
                Geometry::MultiPolygon(multi) => polygons.extend(multi.0),
                Geometry::Rect(rect) => polygons.push(rect.to_polygon()),
                Geometry::Triangle(triangle) => polygons.push(triangle.to_polygon()),
                other => {
                    return Err(BoundaryError::NotPolygonal {
                        found: geometry_name(&other),
                    });
                }
            }
        }
        if polygons.is_empty() {
            return Err(BoundaryError::Empty);
        }
        let area = if polygons.len() == 1 {
            MultiPolygon(polygons)
        } else {
            unary_union(polygons.iter())
        };
        if area.0.is_empty() {
            return Err(BoundaryError::Empty);
        }
        Ok(Self { area })
    }

    /// The rectangle described by a bounding box.
    #[must_use]
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        let ring = LineString::from(vec![
            (bbox.min_x, bbox.min_y),
            (bbox.min_x, bbox.max_y),
            (bbox.max_x, bbox.max_y),
            (bbox.max_x, bbox.min_y),
            (bbox.min_x, bbox.min_y),
        ]);
        Self {
            area: MultiPolygon(vec![Polygon::new(ring, Vec::new())]),
        }
    }

    /// The boundary polygons.
    #[must_use]
    pub const fn area(&self) -> &MultiPolygon<f64> {
        &self.area
    }

    /// Consume the boundary, returning its polygons.
    #[must_use]
    pub fn into_area(self) -> MultiPolygon<f64> {
        self.area
    }

    /// Axis-aligned envelope of the boundary.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.area.bounding_rect()
    }
}

pub(crate) const fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Errors raised when parsing a `minx,miny,maxx,maxy` bounding box.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundingBoxError {
    /// The input did not hold exactly four values.
    #[error("bounding box needs 4 comma separated values, found {count}")]
    WrongArity {
        /// Number of values supplied.
        count: usize,
    },
    /// A value was not a decimal number.
    #[error("bounding box value '{value}' is not a number")]
    NotANumber {
        /// The offending value.
        value: String,
    },
    /// A value parsed to infinity or NaN.
    #[error("bounding box value '{value}' is not finite")]
    NotFinite {
        /// The offending value.
        value: String,
    },
    /// A minimum was not strictly below its maximum.
    #[error("coordinates out of sequence: {axis} minimum {min} must be below maximum {max}")]
    OutOfSequence {
        /// `x` or `y`.
        axis: char,
        /// The supplied minimum.
        min: String,
        /// The supplied maximum.
        max: String,
    },
}

/// A WGS84 rectangle in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western edge.
    pub min_x: f64,
    /// Southern edge.
    pub min_y: f64,
    /// Eastern edge.
    pub max_x: f64,
    /// Northern edge.
    pub max_y: f64,
}

impl BoundingBox {
    /// The box as a `geo` rectangle.
    #[must_use]
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
    }

    /// The value handed to `osmconvert -b=`.
    #[must_use]
    pub fn to_osmconvert_arg(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl FromStr for BoundingBox {
    type Err = BoundingBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: Vec<&str> = s.split(',').map(str::trim).collect();
        let [min_x, min_y, max_x, max_y] = raw.as_slice() else {
            return Err(BoundingBoxError::WrongArity { count: raw.len() });
        };
        let values = [
            parse_degree(min_x)?,
            parse_degree(min_y)?,
            parse_degree(max_x)?,
            parse_degree(max_y)?,
        ];
        let [x0, y0, x1, y1] = values;
        if x0 >= x1 {
            return Err(BoundingBoxError::OutOfSequence {
                axis: 'x',
                min: (*min_x).to_owned(),
                max: (*max_x).to_owned(),
            });
        }
        if y0 >= y1 {
            return Err(BoundingBoxError::OutOfSequence {
                axis: 'y',
                min: (*min_y).to_owned(),
                max: (*max_y).to_owned(),
            });
        }
        Ok(Self {
            min_x: x0,
            min_y: y0,
            max_x: x1,
            max_y: y1,
        })
    }
}

fn parse_degree(raw: &str) -> Result<f64, BoundingBoxError> {
    let value: f64 = raw.parse().map_err(|_| BoundingBoxError::NotANumber {
        value: raw.to_owned(),
    })?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BoundingBoxError::NotFinite {
            value: raw.to_owned(),
        })
    }
}

/// Vector file formats a boundary can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorFormat {
    /// ESRI Shapefile (`.shp`).
    Shapefile,
    /// GeoJSON (`.geojson`, `.json`).
    GeoJson,
    /// GeoPackage (`.gpkg`); holds several layers.
    GeoPackage,
}

impl VectorFormat {
    /// Pick the format from a path's extension.
    #[must_use]
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        let extension = path.extension()?.to_lowercase();
        match extension.as_str() {
            "shp" => Some(Self::Shapefile),
            "geojson" | "json" => Some(Self::GeoJson),
            "gpkg" => Some(Self::GeoPackage),
            _ => None,
        }
    }

    /// Whether the container holds several layers and needs a layer name.
    #[must_use]
    pub const fn is_multi_layer(self) -> bool {
        matches!(self, Self::GeoPackage)
    }
}

/// Errors raised when the clip options cannot describe one boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundarySourceError {
    /// Both a clip file and a bounding box were supplied.
    #[error("a clip file and a bounding box cannot be used together")]
    Conflicting,
    /// The clip file extension is not a supported vector format.
    #[error("clip file {path:?} must be a .shp, .geojson, .json or .gpkg file")]
    UnsupportedFormat {
        /// The rejected path.
        path: Utf8PathBuf,
    },
    /// A multi-layer container was given without a layer name.
    #[error("clip file {path:?} holds several layers; name one with --layer")]
    MissingLayer {
        /// The container path.
        path: Utf8PathBuf,
    },
}

/// Where the clip boundary comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundarySource {
    /// No clipping.
    None,
    /// Polygons read from a vector file.
    VectorFile {
        /// Path to the file.
        path: Utf8PathBuf,
        /// Container format.
        format: VectorFormat,
        /// Layer inside a multi-layer container.
        layer: Option<String>,
    },
    /// A bounding rectangle.
    BoundingBox(BoundingBox),
}

impl BoundarySource {
    /// Validate the clip options and describe the boundary they select.
    ///
    /// # Errors
    /// Returns [`BoundarySourceError`] when both a file and a box are given,
    /// when the file extension is unsupported, or when a GeoPackage has no
    /// layer name.
    ///
    /// # Examples
    /// ```
    /// use pbfcut_core::{BoundarySource, BoundingBox};
    ///
    /// let bbox: BoundingBox = "0,0,1,1".parse()?;
    /// let source = BoundarySource::from_options(None, None, Some(bbox))?;
    /// assert!(matches!(source, BoundarySource::BoundingBox(_)));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_options(
        clip: Option<&Utf8Path>,
        layer: Option<&str>,
        bbox: Option<BoundingBox>,
    ) -> Result<Self, BoundarySourceError> {
        match (clip, bbox) {
            (Some(_), Some(_)) => Err(BoundarySourceError::Conflicting),
            (None, Some(bbox)) => Ok(Self::BoundingBox(bbox)),
            (None, None) => Ok(Self::None),
            (Some(path), None) => {
                let format = VectorFormat::from_path(path).ok_or_else(|| {
                    BoundarySourceError::UnsupportedFormat {
                        path: path.to_path_buf(),
                    }
                })?;
                if format.is_multi_layer() && layer.is_none() {
                    return Err(BoundarySourceError::MissingLayer {
                        path: path.to_path_buf(),
                    });
                }
                Ok(Self::VectorFile {
                    path: path.to_path_buf(),
                    format,
                    layer: layer.map(str::to_owned),
                })
            }
        }
    }

    /// Whether a boundary will be applied.
    #[must_use]
    pub const fn is_some(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for BoundarySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("no boundary"),
            Self::VectorFile {
                path,
                layer: Some(layer),
                ..
            } => write!(f, "{path} (layer {layer})"),
            Self::VectorFile { path, .. } => write!(f, "{path}"),
            Self::BoundingBox(bbox) => write!(f, "bbox {}", bbox.to_osmconvert_arg()),
        }
    }
}
