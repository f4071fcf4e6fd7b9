//! ESRI Shapefile output.

use camino::{Utf8Path, Utf8PathBuf};
use geo::{Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon};
use pbfcut_core::{ExportError, Feature, GeometryKind};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::record::EsriShape;
use shapefile::{Multipoint, Point, Polygon, Polyline, Writer};

use super::columns::{Column, OSM_ID, OSM_TYPE, tag_columns, truncate_bytes};

const FIELD_NAME_LIMIT: usize = 10;
const VALUE_LIMIT: usize = 254;

const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// Write `features` to `path` with `.shx`, `.dbf` and `.prj` sidecars.
pub(super) fn write(
    path: &Utf8Path,
    kind: GeometryKind,
    features: &[Feature],
) -> Result<usize, ExportError> {
    let columns = tag_columns(features, Some(FIELD_NAME_LIMIT), &[OSM_ID, OSM_TYPE]);
    let table = table_builder(path, &columns)?;
    let records: Vec<Record> = features
        .iter()
        .map(|feature| record(feature, &columns))
        .collect();
    match kind {
        GeometryKind::Point if features.iter().any(|f| matches!(f.geometry(), Geometry::MultiPoint(_))) => {
            write_shapes(path, table, features, &records, to_multipoint)?;
        }
        GeometryKind::Point => write_shapes(path, table, features, &records, to_point)?,
        GeometryKind::Line => write_shapes(path, table, features, &records, to_polyline)?,
        GeometryKind::Polygon => write_shapes(path, table, features, &records, to_polygon)?,
    }
    write_projection(path)?;
    Ok(features.len())
}

fn table_builder(path: &Utf8Path, columns: &[Column]) -> Result<TableWriterBuilder, ExportError> {
    let field = |name: &str| {
        FieldName::try_from(name).map_err(|_| {
            ExportError::message(path, format!("'{name}' is not a valid DBF field name"))
        })
    };
    let mut builder = TableWriterBuilder::new()
        .add_numeric_field(field(OSM_ID)?, 20, 0)
        .add_character_field(field(OSM_TYPE)?, 8);
    for column in columns {
        builder = builder.add_character_field(field(&column.name)?, 254);
    }
    Ok(builder)
}

#[expect(
    clippy::cast_precision_loss,
    reason = "DBF numeric fields are stored as f64 and OSM ids fit in 53 bits"
)]
fn record(feature: &Feature, columns: &[Column]) -> Record {
    let mut record = Record::default();
    record.insert(
        OSM_ID.to_owned(),
        FieldValue::Numeric(Some(feature.id() as f64)),
    );
    record.insert(
        OSM_TYPE.to_owned(),
        FieldValue::Character(Some(feature.element().as_str().to_owned())),
    );
    for column in columns {
        let value = feature
            .tags()
            .get(&column.key)
            .map(|value| truncate_bytes(value, VALUE_LIMIT).to_owned());
        record.insert(column.name.clone(), FieldValue::Character(value));
    }
    record
}

fn write_shapes<S, F>(
    path: &Utf8Path,
    table: TableWriterBuilder,
    features: &[Feature],
    records: &[Record],
    convert: F,
) -> Result<(), ExportError>
where
    S: EsriShape,
    F: Fn(&Geometry<f64>) -> Option<S>,
{
    let mut writer = Writer::from_path(path.as_std_path(), table)
        .map_err(|source| ExportError::new(path, "create shapefile", source))?;
    for (feature, record) in features.iter().zip(records) {
        let shape = convert(feature.geometry()).ok_or_else(|| {
            ExportError::message(
                path,
                format!(
                    "{} {} does not fit the layer's shape type",
                    feature.element().as_str(),
                    feature.id()
                ),
            )
        })?;
        writer
            .write_shape_and_record(&shape, record)
            .map_err(|source| ExportError::new(path, "write shape", source))?;
    }
    Ok(())
}

fn write_projection(path: &Utf8Path) -> Result<(), ExportError> {
    let prj: Utf8PathBuf = path.with_extension("prj");
    pbfcut_fs::write_atomic(&prj, WGS84_PRJ.as_bytes())
        .map_err(|source| ExportError::new(prj.clone(), "write projection", source))
}

fn to_point(geometry: &Geometry<f64>) -> Option<Point> {
    match geometry {
        Geometry::Point(point) => Some(Point::from(*point)),
        _ => None,
    }
}

fn to_multipoint(geometry: &Geometry<f64>) -> Option<Multipoint> {
    match geometry {
        Geometry::Point(point) => Some(Multipoint::from(MultiPoint(vec![*point]))),
        Geometry::MultiPoint(points) => Some(Multipoint::from(points.clone())),
        _ => None,
    }
}

fn to_polyline(geometry: &Geometry<f64>) -> Option<Polyline> {
    let lines = match geometry {
        Geometry::Line(line) => MultiLineString(vec![LineString::from(*line)]),
        Geometry::LineString(line) => MultiLineString(vec![line.clone()]),
        Geometry::MultiLineString(lines) => lines.clone(),
        _ => return None,
    };
    Some(Polyline::from(lines))
}

fn to_polygon(geometry: &Geometry<f64>) -> Option<Polygon> {
    let polygons = match geometry {
        Geometry::Polygon(polygon) => MultiPolygon(vec![polygon.clone()]),
        Geometry::MultiPolygon(polygons) => polygons.clone(),
        Geometry::Rect(rect) => MultiPolygon(vec![rect.to_polygon()]),
        Geometry::Triangle(triangle) => MultiPolygon(vec![triangle.to_polygon()]),
        _ => return None,
    };
    Some(Polygon::from(polygons))
}
