//! GeoPackage schema and geometry blob helpers shared by the writer, the
//! boundary reader and the combiner.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use geo::{BoundingRect, Geometry, Rect};
use rusqlite::Connection;
use thiserror::Error;

use crate::wkb::{WkbError, read_wkb, write_wkb};

/// `GPKG` as a big-endian integer.
pub const APPLICATION_ID: i32 = 0x4750_4B47;
/// GeoPackage 1.3.
pub const USER_VERSION: i32 = 10_300;
/// WGS84 geographic coordinates.
pub const WGS84_SRS_ID: i32 = 4326;

const WGS84_DEFINITION: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#;

/// Errors raised while decoding a GeoPackage geometry blob.
#[derive(Debug, Error)]
pub enum GeometryBlobError {
    /// The blob did not start with `GP`.
    #[error("geometry blob is missing the GP magic")]
    Magic,
    /// The envelope indicator was outside 0..=4.
    #[error("invalid envelope indicator {0}")]
    Envelope(u8),
    /// The blob is flagged as an empty geometry.
    #[error("geometry blob is empty")]
    Empty,
    /// The WKB body could not be decoded.
    #[error("invalid WKB body")]
    Wkb(#[from] WkbError),
}

/// Create the metadata tables and register the EPSG:4326 system.
///
/// # Errors
/// Returns the `rusqlite` error of the first failing statement.
pub fn initialise(connection: &Connection) -> rusqlite::Result<()> {
    connection.pragma_update(None, "application_id", APPLICATION_ID)?;
    connection.pragma_update(None, "user_version", USER_VERSION)?;
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
            srs_name TEXT NOT NULL,
            srs_id INTEGER NOT NULL PRIMARY KEY,
            organization TEXT NOT NULL,
            organization_coordsys_id INTEGER NOT NULL,
            definition TEXT NOT NULL,
            description TEXT
        );
        CREATE TABLE IF NOT EXISTS gpkg_contents (
            table_name TEXT NOT NULL PRIMARY KEY,
            data_type TEXT NOT NULL,
            identifier TEXT UNIQUE,
            description TEXT DEFAULT '',
            last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            min_x DOUBLE,
            min_y DOUBLE,
            max_x DOUBLE,
            max_y DOUBLE,
            srs_id INTEGER,
            CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
        );
        CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
            table_name TEXT NOT NULL,
            column_name TEXT NOT NULL,
            geometry_type_name TEXT NOT NULL,
            srs_id INTEGER NOT NULL,
            z TINYINT NOT NULL,
            m TINYINT NOT NULL,
            CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
            CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
            CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
        );",
    )?;
    let mut insert = connection.prepare(
        "INSERT OR IGNORE INTO gpkg_spatial_ref_sys
            (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    insert.execute((
        "Undefined cartesian SRS",
        -1,
        "NONE",
        -1,
        "undefined",
        "undefined cartesian coordinate reference system",
    ))?;
    insert.execute((
        "Undefined geographic SRS",
        0,
        "NONE",
        0,
        "undefined",
        "undefined geographic coordinate reference system",
    ))?;
    insert.execute((
        "WGS 84 geodetic",
        WGS84_SRS_ID,
        "EPSG",
        WGS84_SRS_ID,
        WGS84_DEFINITION,
        "longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid",
    ))?;
    Ok(())
}

/// Quote an SQL identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Encode `geometry` as a GeoPackage binary blob with an XY envelope.
///
/// # Errors
/// Returns [`WkbError`] when the geometry cannot be encoded.
pub fn encode_geometry(geometry: &Geometry<f64>) -> Result<Vec<u8>, WkbError> {
    let envelope = geometry.bounding_rect();
    let mut blob = Vec::with_capacity(48);
    blob.extend_from_slice(b"GP");
    blob.push(0);
    // Bit 0: little-endian. Bits 1-3: envelope kind. Bit 4: empty.
    let flags: u8 = match envelope {
        Some(_) => 0b0000_0011,
        None => 0b0001_0001,
    };
    blob.push(flags);
    blob.write_i32::<LittleEndian>(WGS84_SRS_ID)?;
    if let Some(rect) = envelope {
        for value in [rect.min().x, rect.max().x, rect.min().y, rect.max().y] {
            blob.write_f64::<LittleEndian>(value)?;
        }
    }
    write_wkb(&mut blob, geometry)?;
    Ok(blob)
}

/// Decode a GeoPackage binary blob.
///
/// # Errors
/// Returns [`GeometryBlobError`] for malformed or empty blobs.
pub fn decode_geometry(blob: &[u8]) -> Result<Geometry<f64>, GeometryBlobError> {
    let mut reader = blob;
    let mut magic = [0_u8; 2];
    reader.read_exact(&mut magic).map_err(WkbError::from)?;
    if &magic != b"GP" {
        return Err(GeometryBlobError::Magic);
    }
    let _version = reader.read_u8().map_err(WkbError::from)?;
    let flags = reader.read_u8().map_err(WkbError::from)?;
    if flags & 0b0001_0000 != 0 {
        return Err(GeometryBlobError::Empty);
    }
    let doubles = match (flags >> 1) & 0b111 {
        0 => 0,
        1 => 4,
        2 | 3 => 6,
        4 => 8,
        other => return Err(GeometryBlobError::Envelope(other)),
    };
    let skip = 4 + doubles * 8;
    reader = reader.get(skip..).ok_or_else(|| {
        GeometryBlobError::Wkb(WkbError::Io(std::io::ErrorKind::UnexpectedEof.into()))
    })?;
    Ok(read_wkb(&mut reader)?)
}

/// Union of the bounding rectangles of `geometries`.
pub fn extent<'a, I>(geometries: I) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = &'a Geometry<f64>>,
{
    geometries
        .into_iter()
        .filter_map(BoundingRect::bounding_rect)
        .reduce(|left, right| {
            Rect::new(
                geo::Coord {
                    x: left.min().x.min(right.min().x),
                    y: left.min().y.min(right.min().y),
                },
                geo::Coord {
                    x: left.max().x.max(right.max().x),
                    y: left.max().y.max(right.max().y),
                },
            )
        })
}

/// Feature layers registered in `gpkg_contents` of the schema `schema`.
///
/// # Errors
/// Returns the `rusqlite` error when the metadata table cannot be read.
pub fn feature_layers(connection: &Connection, schema: &str) -> rusqlite::Result<Vec<String>> {
    let sql = format!(
        "SELECT table_name FROM {}.gpkg_contents WHERE data_type = 'features' ORDER BY table_name",
        quote_identifier(schema)
    );
    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}
