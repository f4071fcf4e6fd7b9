//! Polygon boundary readers for Shapefile, GeoJSON and GeoPackage sources.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use geo::{Geometry, MultiPolygon};
use log::{debug, warn};
use pbfcut_core::{Boundary, BoundaryError, BoundarySource, VectorFormat};
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

use crate::geopackage::{GeometryBlobError, decode_geometry, quote_identifier};

/// Errors raised while reading a boundary source.
#[derive(Debug, Error)]
pub enum BoundaryReadError {
    /// The extension is not a supported vector format.
    #[error("unsupported boundary file {path:?}")]
    UnsupportedFormat {
        /// Offending file.
        path: Utf8PathBuf,
    },
    /// The file could not be read.
    #[error("failed to read boundary file {path:?}")]
    Io {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The shapefile could not be decoded.
    #[error("failed to read shapefile {path:?}")]
    Shapefile {
        /// File being read.
        path: Utf8PathBuf,
        /// Error reported by the `shapefile` crate.
        #[source]
        source: shapefile::Error,
    },
    /// The GeoJSON document could not be parsed or converted.
    #[error("failed to read GeoJSON {path:?}")]
    GeoJson {
        /// File being read.
        path: Utf8PathBuf,
        /// Error reported by the `geojson` crate.
        #[source]
        source: Box<geojson::Error>,
    },
    /// The GeoPackage could not be queried.
    #[error("failed to query GeoPackage {path:?}")]
    Sqlite {
        /// File being read.
        path: Utf8PathBuf,
        /// Error reported by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A multi-layer source was read without naming a layer.
    #[error("{path:?} holds several layers; a layer name is required")]
    LayerRequired {
        /// File being read.
        path: Utf8PathBuf,
    },
    /// The named layer has no registered geometry column.
    #[error("layer '{layer}' not found in {path:?}")]
    MissingLayer {
        /// File being read.
        path: Utf8PathBuf,
        /// Requested layer.
        layer: String,
    },
    /// A stored geometry blob could not be decoded.
    #[error("invalid geometry in {path:?}")]
    Geometry {
        /// File being read.
        path: Utf8PathBuf,
        /// Decoding error.
        #[source]
        source: GeometryBlobError,
    },
    /// The source holds no usable polygons.
    #[error("boundary {path:?} is unusable")]
    Boundary {
        /// File being read.
        path: Utf8PathBuf,
        /// Why the polygons were rejected.
        #[source]
        source: BoundaryError,
    },
}

/// Polygons read from one boundary file, plus the label used when writing
/// them as a polygon filter.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLayer {
    /// File stem, or the layer name for GeoPackages.
    pub label: String,
    /// One entry per source row, in file order.
    pub geometries: Vec<Geometry<f64>>,
    path: Utf8PathBuf,
}

impl BoundaryLayer {
    /// A layer labelled `label` holding `geometries` read from `path`.
    pub fn new(
        label: impl Into<String>,
        path: impl Into<Utf8PathBuf>,
        geometries: Vec<Geometry<f64>>,
    ) -> Self {
        Self {
            label: label.into(),
            geometries,
            path: path.into(),
        }
    }

    /// The file the layer came from.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Union the layer's polygons into a [`Boundary`].
    ///
    /// # Errors
    /// Returns [`BoundaryReadError::Boundary`] when no polygon was read or a
    /// row holds another geometry type.
    pub fn to_boundary(&self) -> Result<Boundary, BoundaryReadError> {
        Boundary::from_geometries(self.geometries.iter().cloned()).map_err(|source| {
            BoundaryReadError::Boundary {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Read the polygons of `path`, choosing the reader from its extension.
///
/// `layer` selects the table inside a GeoPackage and is ignored for
/// single-layer formats.
///
/// # Errors
/// Returns [`BoundaryReadError`] when the file cannot be read.
pub fn read_boundary_layer(
    path: &Utf8Path,
    layer: Option<&str>,
) -> Result<BoundaryLayer, BoundaryReadError> {
    let format = VectorFormat::from_path(path).ok_or_else(|| {
        BoundaryReadError::UnsupportedFormat {
            path: path.to_path_buf(),
        }
    })?;
    let (label, geometries) = match format {
        VectorFormat::Shapefile => (file_label(path), read_shapefile(path)?),
        VectorFormat::GeoJson => (file_label(path), read_geojson(path)?),
        VectorFormat::GeoPackage => {
            let layer = layer.ok_or_else(|| BoundaryReadError::LayerRequired {
                path: path.to_path_buf(),
            })?;
            (layer.to_owned(), read_geopackage(path, layer)?)
        }
    };
    debug!("read {} boundary geometries from {path}", geometries.len());
    Ok(BoundaryLayer::new(label, path, geometries))
}

/// Resolve a configured boundary source into its area, if any.
///
/// # Errors
/// Returns [`BoundaryReadError`] when a vector source cannot be read or
/// holds no polygons.
pub fn resolve_boundary(source: &BoundarySource) -> Result<Option<Boundary>, BoundaryReadError> {
    match source {
        BoundarySource::None => Ok(None),
        BoundarySource::BoundingBox(bbox) => Ok(Some(Boundary::from_bbox(bbox))),
        BoundarySource::VectorFile { path, layer, .. } => {
            read_boundary_layer(path, layer.as_deref())?
                .to_boundary()
                .map(Some)
        }
    }
}

fn file_label(path: &Utf8Path) -> String {
    path.file_stem().unwrap_or("boundary").to_owned()
}

fn read_shapefile(path: &Utf8Path) -> Result<Vec<Geometry<f64>>, BoundaryReadError> {
    let polygons = shapefile::read_shapes_as::<_, shapefile::Polygon>(path.as_std_path())
        .map_err(|source| BoundaryReadError::Shapefile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(polygons
        .into_iter()
        .map(|polygon| Geometry::MultiPolygon(MultiPolygon::<f64>::from(polygon)))
        .collect())
}

fn read_geojson(path: &Utf8Path) -> Result<Vec<Geometry<f64>>, BoundaryReadError> {
    let text = pbfcut_fs::read_to_string(path).map_err(|source| BoundaryReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let geojson_error = |source: geojson::Error| BoundaryReadError::GeoJson {
        path: path.to_path_buf(),
        source: Box::new(source),
    };
    let document: geojson::GeoJson = text.parse().map_err(geojson_error)?;
    let values: Vec<geojson::Value> = match document {
        geojson::GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .filter_map(|feature| feature.geometry.map(|geometry| geometry.value))
            .collect(),
        geojson::GeoJson::Feature(feature) => feature
            .geometry
            .map(|geometry| geometry.value)
            .into_iter()
            .collect(),
        geojson::GeoJson::Geometry(geometry) => vec![geometry.value],
    };
    values
        .into_iter()
        .map(|value| Geometry::<f64>::try_from(value).map_err(geojson_error))
        .collect()
}

fn read_geopackage(path: &Utf8Path, layer: &str) -> Result<Vec<Geometry<f64>>, BoundaryReadError> {
    let sqlite_error = |source: rusqlite::Error| BoundaryReadError::Sqlite {
        path: path.to_path_buf(),
        source,
    };
    let connection =
        Connection::open_with_flags(path.as_std_path(), OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(sqlite_error)?;
    let column: Option<String> = connection
        .prepare("SELECT column_name FROM gpkg_geometry_columns WHERE table_name = ?1")
        .and_then(|mut statement| {
            let mut rows = statement.query([layer])?;
            rows.next()?.map(|row| row.get(0)).transpose()
        })
        .map_err(sqlite_error)?;
    let column = column.ok_or_else(|| BoundaryReadError::MissingLayer {
        path: path.to_path_buf(),
        layer: layer.to_owned(),
    })?;
    let sql = format!(
        "SELECT {} FROM {}",
        quote_identifier(&column),
        quote_identifier(layer)
    );
    let mut statement = connection.prepare(&sql).map_err(sqlite_error)?;
    let blobs = statement
        .query_map([], |row| row.get::<_, Option<Vec<u8>>>(0))
        .map_err(sqlite_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sqlite_error)?;
    let mut geometries = Vec::with_capacity(blobs.len());
    for blob in blobs.into_iter().flatten() {
        match decode_geometry(&blob) {
            Ok(geometry) => geometries.push(geometry),
            Err(GeometryBlobError::Empty) => warn!("skipping empty geometry in {path}"),
            Err(source) => {
                return Err(BoundaryReadError::Geometry {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
    Ok(geometries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileExporter;
    use geo::{Area, LineString, Polygon};
    use pbfcut_core::{
        ElementKind, Feature, FeatureExporter, GeometryKind, OutputFormat, Tags, Theme,
    };
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn scratch() -> TempDir {
        TempDir::new().expect("temp dir")
    }

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir")
    }

    fn square(min: f64, max: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(min, min), (max, min), (max, max), (min, max), (min, min)]),
            Vec::new(),
        )
    }

    fn areas(dir: &Utf8Path, format: OutputFormat) -> Utf8PathBuf {
        let features: Vec<Feature> = [square(0.0, 1.0), square(1.0, 2.0)]
            .into_iter()
            .enumerate()
            .map(|(id, polygon)| {
                Feature::new(
                    i64::try_from(id).expect("small id"),
                    ElementKind::Way,
                    Geometry::Polygon(polygon),
                    Tags::new(),
                )
                .expect("feature")
            })
            .collect();
        FileExporter::new(dir, "clip", format)
            .export(Theme::Boundary, GeometryKind::Polygon, &features)
            .expect("export")
            .path
    }

    #[rstest]
    #[case(OutputFormat::Shapefile, None, "clip_boundary_polygon")]
    #[case(OutputFormat::GeoJson, None, "clip_boundary_polygon")]
    #[case(OutputFormat::GeoPackage, Some("boundary_polygon"), "boundary_polygon")]
    fn every_format_reads_back(
        scratch: TempDir,
        #[case] format: OutputFormat,
        #[case] layer: Option<&str>,
        #[case] label: &str,
    ) {
        let path = areas(&utf8(&scratch), format);
        let read = read_boundary_layer(&path, layer).expect("read boundary");
        assert_eq!(read.label, label);
        assert_eq!(read.geometries.len(), 2);
        let boundary = read.to_boundary().expect("boundary");
        assert!((boundary.area().unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[rstest]
    fn geopackages_need_a_layer(scratch: TempDir) {
        let path = areas(&utf8(&scratch), OutputFormat::GeoPackage);
        assert!(matches!(
            read_boundary_layer(&path, None),
            Err(BoundaryReadError::LayerRequired { .. })
        ));
        assert!(matches!(
            read_boundary_layer(&path, Some("roads")),
            Err(BoundaryReadError::MissingLayer { layer, .. }) if layer == "roads"
        ));
    }

    #[rstest]
    fn geojson_without_polygons_is_unusable(scratch: TempDir) {
        let path = utf8(&scratch).join("line.geojson");
        std::fs::write(
            &path,
            r#"{"type":"LineString","coordinates":[[0.0,0.0],[1.0,1.0]]}"#,
        )
        .expect("write geojson");
        let layer = read_boundary_layer(&path, None).expect("parse");
        assert!(matches!(
            layer.to_boundary(),
            Err(BoundaryReadError::Boundary { .. })
        ));
    }

    #[test]
    fn bounding_boxes_resolve_without_io() {
        let bbox = "0,0,2,1".parse().expect("bbox");
        let boundary = resolve_boundary(&BoundarySource::BoundingBox(bbox))
            .expect("resolve")
            .expect("some boundary");
        assert!((boundary.area().unsigned_area() - 2.0).abs() < 1e-9);
        assert!(resolve_boundary(&BoundarySource::None).expect("resolve").is_none());
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        assert!(matches!(
            read_boundary_layer(Utf8Path::new("area.kml"), None),
            Err(BoundaryReadError::UnsupportedFormat { .. })
        ));
    }
}
